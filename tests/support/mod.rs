//! Shared fakes for the integration suites: a scripted provider and an
//! in-memory harness wired the way `keel serve` wires the real thing.

#![allow(dead_code)]

use async_trait::async_trait;
use keel::actions::default_registry;
use keel::collaborators::memory::{
    MemoryDocumentStore, MemoryLedger, MemoryRelationshipStore, MemorySheet, StaticScrapeSource,
    StaticUpdatesSource,
};
use keel::collaborators::{Collaborators, Ledger, LedgerMetadata};
use keel::providers::{Oracle, Provider};
use keel::router::{Allowlist, EmailRouter, InboundEmail, IntentClassifier};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Answers from a queue, then with `fallback`.
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn replying(fallback: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, reply: &str) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(reply.to_string()));
        self
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat_with_system(
        &self,
        _system_prompt: Option<&str>,
        _message: &str,
        _model: &str,
        _temperature: f64,
    ) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
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

pub struct OfflineLedger;

#[async_trait]
impl Ledger for OfflineLedger {
    async fn is_processed(&self, _key: &str) -> anyhow::Result<bool> {
        anyhow::bail!("ledger unreachable")
    }
    async fn try_claim(&self, _key: &str) -> anyhow::Result<bool> {
        anyhow::bail!("ledger unreachable")
    }
    async fn mark_processed(&self, _key: &str, _metadata: &LedgerMetadata) -> anyhow::Result<()> {
        anyhow::bail!("ledger unreachable")
    }
    async fn release(&self, _key: &str) -> anyhow::Result<()> {
        anyhow::bail!("ledger unreachable")
    }
    async fn clear(&self, _key: &str) -> anyhow::Result<bool> {
        anyhow::bail!("ledger unreachable")
    }
    async fn probe(&self) -> anyhow::Result<()> {
        anyhow::bail!("ledger unreachable")
    }
}

pub struct Harness {
    pub sheet: Arc<MemorySheet>,
    pub documents: Arc<MemoryDocumentStore>,
    pub relationships: Arc<MemoryRelationshipStore>,
    pub provider: Arc<ScriptedProvider>,
    pub router: EmailRouter,
}

impl Harness {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self::build(provider, &[], None)
    }

    pub fn with_rows(provider: ScriptedProvider, rows: &[(&str, &str, &str)]) -> Self {
        Self::build(provider, rows, None)
    }

    pub fn build(
        provider: ScriptedProvider,
        rows: &[(&str, &str, &str)],
        ledger: Option<Arc<dyn Ledger>>,
    ) -> Self {
        let sheet = Arc::new(MemorySheet::with_rows(rows));
        let documents = Arc::new(MemoryDocumentStore::new());
        let relationships = Arc::new(MemoryRelationshipStore::new());
        let provider = Arc::new(provider);

        let collaborators = Collaborators {
            sheet: sheet.clone(),
            ledger: ledger.unwrap_or_else(|| Arc::new(MemoryLedger::new())),
            documents: documents.clone(),
            scraper: Arc::new(StaticScrapeSource::new(Vec::new())),
            updates: Arc::new(StaticUpdatesSource::new(Vec::new())),
            relationships: relationships.clone(),
            oracle: Oracle::new(provider.clone(), "scripted-model", 0.7),
        };
        let registry = default_registry(&collaborators).expect("built-in actions register once");
        let router = EmailRouter::new(
            Arc::new(registry),
            IntentClassifier::new(collaborators.oracle.clone()),
            Allowlist::new(["friale.com"]),
        );

        Self {
            sheet,
            documents,
            relationships,
            provider,
            router,
        }
    }
}

pub fn from_partner(subject: &str, body: &str) -> InboundEmail {
    InboundEmail::new("Nick F <nick@friale.com>", "keel@friale.com", subject, body)
}
