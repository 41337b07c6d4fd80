use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_NEW: &str = "New";
pub const STATUS_MEMO_CREATED: &str = "Memo Created";
pub const STATUS_MEMO_REGENERATED: &str = "Memo Regenerated";
pub const STATUS_ERROR: &str = "Error";

// ── Sheet ────────────────────────────────────────────────────────

/// One deal-flow row. `row` is the 1-based sheet row number (row 1 is the header).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    pub row: usize,
    pub company: String,
    pub domain: String,
    pub status: String,
    pub source: String,
}

impl SheetRow {
    /// Eligible for the batch pipeline: named, has a domain, status blank,
    /// `New` or `Error`. Failed rows are retried; the ledger still decides
    /// whether a memo exists.
    pub fn is_unprocessed(&self) -> bool {
        let status = self.status.trim();
        !self.company.trim().is_empty()
            && !self.domain.trim().is_empty()
            && (status.is_empty()
                || status.eq_ignore_ascii_case(STATUS_NEW)
                || status.eq_ignore_ascii_case(STATUS_ERROR))
    }

    pub fn ledger_key(&self) -> String {
        company_key(&self.company, &self.domain)
    }

    /// Rows sourced from an accelerator batch carry the batch id (`W26`, `S25`).
    pub fn is_batch_sourced(&self) -> bool {
        let source = self.source.trim();
        source.len() >= 2
            && source.starts_with(['W', 'S', 'F', 'X'])
            && source[1..].chars().all(|c| c.is_ascii_digit())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetField {
    Company,
    Domain,
    Status,
    Source,
}

impl SheetField {
    pub fn column(self) -> char {
        match self {
            Self::Company => 'A',
            Self::Domain => 'B',
            Self::Status => 'C',
            Self::Source => 'D',
        }
    }
}

/// Ledger key for a company: the trimmed lowercase domain, or the name with
/// spaces turned into dashes when there is no domain.
pub fn company_key(company: &str, domain: &str) -> String {
    let domain = domain.trim();
    if domain.is_empty() {
        company.trim().to_lowercase().replace(' ', "-")
    } else {
        domain.to_lowercase()
    }
}

// ── Ledger ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMetadata {
    pub company: String,
    pub document_id: Option<String>,
    pub folder_id: Option<String>,
}

// ── Documents ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub heading: Option<String>,
    pub body: String,
}

/// Structured document body; rendered to plain markdown-style text on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub title: String,
    pub sections: Vec<DocumentSection>,
}

impl DocumentContent {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    /// Content that is already a full document (e.g. a generated memo).
    pub fn from_text(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(title).section(None::<String>, text)
    }

    pub fn section(mut self, heading: Option<impl Into<String>>, body: impl Into<String>) -> Self {
        self.sections.push(DocumentSection {
            heading: heading.map(Into::into),
            body: body.into(),
        });
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            if let Some(heading) = &section.heading {
                out.push_str("## ");
                out.push_str(heading);
                out.push_str("\n\n");
            }
            out.push_str(section.body.trim_end());
            out.push_str("\n\n");
        }
        out.trim_end().to_string()
    }
}

pub fn document_url(document_id: &str) -> String {
    format!("https://docs.google.com/document/d/{document_id}/edit")
}

// ── Scraping ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedCompany {
    pub id: String,
    pub name: String,
    /// Often unknown at scrape time.
    pub domain: String,
    pub batch: String,
}

// ── Company updates ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEmail {
    pub from: String,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub body: String,
}

// ── Relationships ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub from: String,
    pub date: String,
    pub subject: String,
    pub body: String,
}

impl ThreadMessage {
    /// Identity used to merge re-forwarded copies of the same message.
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}",
            self.from.trim().to_lowercase(),
            self.date.trim(),
            self.subject.trim()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: String,
    pub event: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Normalized domain (or name key when the domain is unknown).
    pub key: String,
    pub company_name: String,
    pub domain: String,
    pub messages: Vec<ThreadMessage>,
    pub timeline: Vec<TimelineEntry>,
    pub summary: String,
    pub document_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}
