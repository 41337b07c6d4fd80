//! Contracts for the external systems actions talk to. Actions receive the
//! subset they need as `Arc<dyn ...>`; the router never touches them.

use super::types::{
    DocumentContent, LedgerMetadata, Relationship, ScrapedCompany, SheetField, SheetRow,
    UpdateEmail, document_url,
};
use crate::actions::params::normalize_domain;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Deal-flow spreadsheet.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn list_rows(&self) -> anyhow::Result<Vec<SheetRow>>;

    async fn list_unprocessed_rows(&self) -> anyhow::Result<Vec<SheetRow>> {
        Ok(self
            .list_rows()
            .await?
            .into_iter()
            .filter(SheetRow::is_unprocessed)
            .collect())
    }

    /// Append `[company, domain, New, source]`.
    async fn append_row(&self, company: &str, domain: &str, source: &str) -> anyhow::Result<()>;

    /// Overwrite one cell of the row numbered `row`.
    async fn update_row_field(
        &self,
        row: usize,
        field: SheetField,
        value: &str,
    ) -> anyhow::Result<()>;

    async fn find_row(&self, domain_or_name: &str) -> anyhow::Result<Option<SheetRow>> {
        Ok(find_matching_row(&self.list_rows().await?, domain_or_name))
    }

    async fn probe(&self) -> anyhow::Result<()> {
        self.list_rows().await.map(|_| ())
    }
}

/// Match by normalized domain first, then by case-insensitive name, then by
/// name against the query with a common TLD stripped (`acme.io` → `acme`).
pub fn find_matching_row(rows: &[SheetRow], domain_or_name: &str) -> Option<SheetRow> {
    let query = domain_or_name.trim();
    if query.is_empty() {
        return None;
    }

    if let Some(domain) = normalize_domain(query)
        && let Some(row) = rows
            .iter()
            .find(|r| normalize_domain(&r.domain).as_deref() == Some(domain.as_str()))
    {
        return Some(row.clone());
    }

    let by_name = |needle: &str| {
        rows.iter()
            .find(|r| r.company.trim().eq_ignore_ascii_case(needle))
            .cloned()
    };

    by_name(query).or_else(|| {
        let lowered = query.to_lowercase();
        [".com", ".io", ".ai", ".co"]
            .iter()
            .find_map(|tld| lowered.strip_suffix(tld))
            .and_then(by_name)
    })
}

/// Idempotency store keyed by a normalized identifier (lowercase + trim).
///
/// `try_claim` is a conditional create: of two concurrent callers for the same
/// key exactly one gets `true`.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn is_processed(&self, key: &str) -> anyhow::Result<bool>;

    async fn try_claim(&self, key: &str) -> anyhow::Result<bool>;

    async fn mark_processed(&self, key: &str, metadata: &LedgerMetadata) -> anyhow::Result<()>;

    /// Drop an unfinished claim so the key can be retried.
    async fn release(&self, key: &str) -> anyhow::Result<()>;

    /// Remove the entry whatever its state. Returns whether one existed.
    async fn clear(&self, key: &str) -> anyhow::Result<bool>;

    async fn probe(&self) -> anyhow::Result<()>;
}

pub fn normalize_ledger_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Folder and document storage for memos and timelines.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find a folder by exact name under the configured parent, creating it if absent.
    async fn ensure_folder(&self, name: &str) -> anyhow::Result<String>;

    /// Create an empty document titled `template` in `folder_id`.
    async fn create_document(&self, folder_id: &str, template: &str) -> anyhow::Result<String>;

    /// Replace the document body.
    async fn write_content(
        &self,
        document_id: &str,
        content: &DocumentContent,
    ) -> anyhow::Result<()>;

    fn document_url(&self, document_id: &str) -> String {
        document_url(document_id)
    }

    async fn probe(&self) -> anyhow::Result<()>;
}

/// Accelerator directory scraper.
#[async_trait]
pub trait ScrapeSource: Send + Sync {
    async fn list_companies(
        &self,
        batch: &str,
        max_pages: Option<u32>,
    ) -> anyhow::Result<Vec<ScrapedCompany>>;
}

/// Previously received company update emails.
#[async_trait]
pub trait UpdatesSource: Send + Sync {
    async fn fetch_updates(
        &self,
        domain: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<UpdateEmail>>;
}

/// Relationship timelines built from forwarded threads.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Relationship>>;

    async fn upsert(&self, relationship: &Relationship) -> anyhow::Result<()>;
}
