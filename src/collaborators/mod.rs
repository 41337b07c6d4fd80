pub mod bookface;
pub mod factory;
pub mod google;
pub mod memory;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use bookface::BookfaceClient;
pub use factory::{build_collaborators, build_mailbox};
pub use traits::{
    DocumentStore, Ledger, RelationshipStore, ScrapeSource, SheetSource, UpdatesSource,
};
pub use types::{
    DocumentContent, LedgerMetadata, Relationship, ScrapedCompany, SheetField, SheetRow,
    ThreadMessage, TimelineEntry, UpdateEmail,
};

use crate::providers::Oracle;
use std::sync::Arc;

/// Everything actions may call out to. Cheap to clone.
#[derive(Clone)]
pub struct Collaborators {
    pub sheet: Arc<dyn SheetSource>,
    pub ledger: Arc<dyn Ledger>,
    pub documents: Arc<dyn DocumentStore>,
    pub scraper: Arc<dyn ScrapeSource>,
    pub updates: Arc<dyn UpdatesSource>,
    pub relationships: Arc<dyn RelationshipStore>,
    pub oracle: Oracle,
}
