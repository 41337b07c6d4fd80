//! Fakes shared by the action and router unit tests.

use crate::collaborators::memory::{
    MemoryDocumentStore, MemoryLedger, MemoryRelationshipStore, MemorySheet, StaticScrapeSource,
    StaticUpdatesSource,
};
use crate::collaborators::types::{ScrapedCompany, UpdateEmail};
use crate::collaborators::{Collaborators, Ledger};
use crate::providers::{Oracle, Provider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Replies from a queue, then with `fallback`. `Err` entries fail the call.
pub(crate) struct MockProvider {
    queue: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub(crate) fn replying(fallback: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn then(self, reply: &str) -> Self {
        self.push(Ok(reply.to_string()));
        self
    }

    pub(crate) fn then_fail(self, message: &str) -> Self {
        self.push(Err(message.to_string()));
        self
    }

    fn push(&self, item: Result<String, String>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(item);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat_with_system(
        &self,
        _system_prompt: Option<&str>,
        message: &str,
        _model: &str,
        _temperature: f64,
    ) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        let next = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => anyhow::bail!(message),
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Ledger whose every call fails, for health and fault-path tests.
pub(crate) struct BrokenLedger;

#[async_trait]
impl Ledger for BrokenLedger {
    async fn is_processed(&self, _key: &str) -> anyhow::Result<bool> {
        anyhow::bail!("ledger offline")
    }
    async fn try_claim(&self, _key: &str) -> anyhow::Result<bool> {
        anyhow::bail!("ledger offline")
    }
    async fn mark_processed(
        &self,
        _key: &str,
        _metadata: &crate::collaborators::LedgerMetadata,
    ) -> anyhow::Result<()> {
        anyhow::bail!("ledger offline")
    }
    async fn release(&self, _key: &str) -> anyhow::Result<()> {
        anyhow::bail!("ledger offline")
    }
    async fn clear(&self, _key: &str) -> anyhow::Result<bool> {
        anyhow::bail!("ledger offline")
    }
    async fn probe(&self) -> anyhow::Result<()> {
        anyhow::bail!("ledger offline")
    }
}

pub(crate) struct Fixture {
    pub sheet: Arc<MemorySheet>,
    pub ledger: Arc<MemoryLedger>,
    pub documents: Arc<MemoryDocumentStore>,
    pub relationships: Arc<MemoryRelationshipStore>,
    pub provider: Arc<MockProvider>,
    pub collaborators: Collaborators,
}

impl Fixture {
    pub(crate) fn new(provider: MockProvider) -> Self {
        Self::with(provider, &[], Vec::new(), Vec::new())
    }

    pub(crate) fn with_rows(provider: MockProvider, rows: &[(&str, &str, &str)]) -> Self {
        Self::with(provider, rows, Vec::new(), Vec::new())
    }

    pub(crate) fn with(
        provider: MockProvider,
        rows: &[(&str, &str, &str)],
        scraped: Vec<ScrapedCompany>,
        updates: Vec<UpdateEmail>,
    ) -> Self {
        let sheet = Arc::new(MemorySheet::with_rows(rows));
        let ledger = Arc::new(MemoryLedger::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let relationships = Arc::new(MemoryRelationshipStore::new());
        let provider = Arc::new(provider);

        let collaborators = Collaborators {
            sheet: sheet.clone(),
            ledger: ledger.clone(),
            documents: documents.clone(),
            scraper: Arc::new(StaticScrapeSource::new(scraped)),
            updates: Arc::new(StaticUpdatesSource::new(updates)),
            relationships: relationships.clone(),
            oracle: Oracle::new(provider.clone(), "mock-model", 0.7),
        };

        Self {
            sheet,
            ledger,
            documents,
            relationships,
            provider,
            collaborators,
        }
    }
}

pub(crate) fn params(value: serde_json::Value) -> crate::actions::params::Parameters {
    value.as_object().cloned().unwrap_or_default()
}
