//! In-process collaborators. Back the `memory` backend and the test suites.

use super::traits::{
    DocumentStore, Ledger, RelationshipStore, ScrapeSource, SheetSource, UpdatesSource,
    normalize_ledger_key,
};
use super::types::{
    DocumentContent, LedgerMetadata, Relationship, STATUS_NEW, ScrapedCompany, SheetField,
    SheetRow, UpdateEmail,
};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

fn poisoned(what: &str) -> anyhow::Error {
    anyhow!("{what} lock poisoned")
}

// ── Sheet ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemorySheet {
    rows: Mutex<Vec<SheetRow>>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with `(company, domain, status)` triples; rows are numbered from 2.
    pub fn with_rows(rows: &[(&str, &str, &str)]) -> Self {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, (company, domain, status))| SheetRow {
                row: i + 2,
                company: (*company).to_string(),
                domain: (*domain).to_string(),
                status: (*status).to_string(),
                source: String::new(),
            })
            .collect();
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn snapshot(&self) -> Vec<SheetRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SheetSource for MemorySheet {
    async fn list_rows(&self) -> anyhow::Result<Vec<SheetRow>> {
        Ok(self.rows.lock().map_err(|_| poisoned("sheet"))?.clone())
    }

    async fn append_row(&self, company: &str, domain: &str, source: &str) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("sheet"))?;
        let row = rows.last().map_or(2, |last| last.row + 1);
        rows.push(SheetRow {
            row,
            company: company.to_string(),
            domain: domain.to_string(),
            status: STATUS_NEW.to_string(),
            source: source.to_string(),
        });
        Ok(())
    }

    async fn update_row_field(
        &self,
        row: usize,
        field: SheetField,
        value: &str,
    ) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("sheet"))?;
        let target = rows
            .iter_mut()
            .find(|r| r.row == row)
            .with_context(|| format!("sheet row {row} does not exist"))?;
        let cell = match field {
            SheetField::Company => &mut target.company,
            SheetField::Domain => &mut target.domain,
            SheetField::Status => &mut target.status,
            SheetField::Source => &mut target.source,
        };
        *cell = value.to_string();
        Ok(())
    }
}

// ── Ledger ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Claimed,
    Processed(LedgerMetadata),
}

#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self, key: &str) -> Option<LedgerMetadata> {
        let entries = self.entries.lock().ok()?;
        match entries.get(&normalize_ledger_key(key))? {
            Entry::Processed(meta) => Some(meta.clone()),
            Entry::Claimed => None,
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn is_processed(&self, key: &str) -> anyhow::Result<bool> {
        let entries = self.entries.lock().map_err(|_| poisoned("ledger"))?;
        Ok(matches!(
            entries.get(&normalize_ledger_key(key)),
            Some(Entry::Processed(_))
        ))
    }

    async fn try_claim(&self, key: &str) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock().map_err(|_| poisoned("ledger"))?;
        let key = normalize_ledger_key(key);
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(key, Entry::Claimed);
        Ok(true)
    }

    async fn mark_processed(&self, key: &str, metadata: &LedgerMetadata) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned("ledger"))?;
        entries.insert(normalize_ledger_key(key), Entry::Processed(metadata.clone()));
        Ok(())
    }

    async fn release(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned("ledger"))?;
        let key = normalize_ledger_key(key);
        if entries.get(&key) == Some(&Entry::Claimed) {
            entries.remove(&key);
        }
        Ok(())
    }

    async fn clear(&self, key: &str) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock().map_err(|_| poisoned("ledger"))?;
        Ok(entries.remove(&normalize_ledger_key(key)).is_some())
    }

    async fn probe(&self) -> anyhow::Result<()> {
        self.entries.lock().map(|_| ()).map_err(|_| poisoned("ledger"))
    }
}

// ── Documents ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub folder_id: String,
    pub title: String,
    pub content: Option<DocumentContent>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    folders: Mutex<HashMap<String, String>>,
    documents: Mutex<HashMap<String, StoredDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, id: &str) -> Option<StoredDocument> {
        self.documents.lock().ok()?.get(id).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ensure_folder(&self, name: &str) -> anyhow::Result<String> {
        let mut folders = self.folders.lock().map_err(|_| poisoned("folders"))?;
        let id = folders
            .entry(name.to_string())
            .or_insert_with(|| format!("folder-{}", uuid::Uuid::new_v4().simple()));
        Ok(id.clone())
    }

    async fn create_document(&self, folder_id: &str, template: &str) -> anyhow::Result<String> {
        let id = format!("doc-{}", uuid::Uuid::new_v4().simple());
        self.documents
            .lock()
            .map_err(|_| poisoned("documents"))?
            .insert(
                id.clone(),
                StoredDocument {
                    folder_id: folder_id.to_string(),
                    title: template.to_string(),
                    content: None,
                },
            );
        Ok(id)
    }

    async fn write_content(
        &self,
        document_id: &str,
        content: &DocumentContent,
    ) -> anyhow::Result<()> {
        let mut documents = self.documents.lock().map_err(|_| poisoned("documents"))?;
        let doc = documents
            .get_mut(document_id)
            .with_context(|| format!("document {document_id} does not exist"))?;
        doc.content = Some(content.clone());
        Ok(())
    }

    async fn probe(&self) -> anyhow::Result<()> {
        self.documents
            .lock()
            .map(|_| ())
            .map_err(|_| poisoned("documents"))
    }
}

// ── Scrape / updates ─────────────────────────────────────────────

/// Fixed scrape results, filtered by batch.
#[derive(Default)]
pub struct StaticScrapeSource {
    companies: Vec<ScrapedCompany>,
}

impl StaticScrapeSource {
    pub fn new(companies: Vec<ScrapedCompany>) -> Self {
        Self { companies }
    }
}

#[async_trait]
impl ScrapeSource for StaticScrapeSource {
    async fn list_companies(
        &self,
        batch: &str,
        _max_pages: Option<u32>,
    ) -> anyhow::Result<Vec<ScrapedCompany>> {
        Ok(self
            .companies
            .iter()
            .filter(|c| c.batch.eq_ignore_ascii_case(batch))
            .cloned()
            .collect())
    }
}

/// Fixed update emails keyed by sender domain.
#[derive(Default)]
pub struct StaticUpdatesSource {
    emails: Vec<UpdateEmail>,
}

impl StaticUpdatesSource {
    pub fn new(emails: Vec<UpdateEmail>) -> Self {
        Self { emails }
    }
}

#[async_trait]
impl UpdatesSource for StaticUpdatesSource {
    async fn fetch_updates(
        &self,
        domain: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<UpdateEmail>> {
        let suffix = format!("@{}", domain.to_lowercase());
        let mut found: Vec<UpdateEmail> = self
            .emails
            .iter()
            .filter(|e| e.from.to_lowercase().trim_end_matches('>').ends_with(&suffix))
            .filter(|e| e.date.is_none_or(|d| d >= since))
            .cloned()
            .collect();
        found.sort_by_key(|e| e.date);
        found.truncate(limit);
        Ok(found)
    }
}

// ── Relationships ────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryRelationshipStore {
    records: Mutex<HashMap<String, Relationship>>,
}

impl MemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipStore for MemoryRelationshipStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Relationship>> {
        let records = self.records.lock().map_err(|_| poisoned("relationships"))?;
        Ok(records.get(&normalize_ledger_key(key)).cloned())
    }

    async fn upsert(&self, relationship: &Relationship) -> anyhow::Result<()> {
        let mut records = self.records.lock().map_err(|_| poisoned("relationships"))?;
        records.insert(
            normalize_ledger_key(&relationship.key),
            relationship.clone(),
        );
        Ok(())
    }
}
