//! The action catalogue: the `Action` trait, its result type, the frozen
//! registry and the eight built-in actions.

pub mod add_company;
pub mod analyze_thread;
pub mod generate_memos;
pub mod health_check;
pub mod memo;
pub mod name;
pub mod params;
pub mod regenerate_memo;
pub mod registry;
pub mod result;
pub mod scrape_yc;
pub mod summarize_updates;
pub mod thread;
pub mod traits;
pub mod update_company;

#[cfg(test)]
pub(crate) mod testing;

pub use add_company::{AddCompanyAction, AddOutcome, CompanyAdder};
pub use analyze_thread::AnalyzeThreadAction;
pub use generate_memos::GenerateMemosAction;
pub use health_check::HealthCheckAction;
pub use memo::{MemoMode, MemoOutcome, MemoPipeline, MemoTarget};
pub use name::ActionName;
pub use params::Parameters;
pub use regenerate_memo::RegenerateMemoAction;
pub use registry::{ActionRegistry, ActionRegistryBuilder};
pub use result::ActionResult;
pub use scrape_yc::ScrapeYcAction;
pub use summarize_updates::SummarizeUpdatesAction;
pub use traits::{Action, ActionRequest};
pub use update_company::UpdateCompanyAction;

use crate::collaborators::Collaborators;
use crate::error::ActionError;

/// Build and freeze the registry with every built-in action wired to
/// `collaborators`. Sheet appends from email, scraping and thread analysis
/// share one `CompanyAdder`.
pub fn default_registry(collaborators: &Collaborators) -> Result<ActionRegistry, ActionError> {
    let adder = CompanyAdder::new(collaborators.sheet.clone());
    let pipeline = MemoPipeline::new(collaborators);

    let registry = ActionRegistry::builder()
        .register(GenerateMemosAction::new(pipeline.clone()))?
        .register(AddCompanyAction::new(adder.clone()))?
        .register(UpdateCompanyAction::new(
            collaborators.sheet.clone(),
            collaborators.ledger.clone(),
        ))?
        .register(RegenerateMemoAction::new(pipeline))?
        .register(AnalyzeThreadAction::new(
            collaborators.relationships.clone(),
            collaborators.documents.clone(),
            adder.clone(),
            collaborators.oracle.clone(),
        ))?
        .register(SummarizeUpdatesAction::new(
            collaborators.sheet.clone(),
            collaborators.updates.clone(),
            collaborators.documents.clone(),
            collaborators.oracle.clone(),
        ))?
        .register(ScrapeYcAction::new(collaborators.scraper.clone(), adder))?
        .register(HealthCheckAction::new(
            collaborators.sheet.clone(),
            collaborators.ledger.clone(),
            collaborators.documents.clone(),
            collaborators.oracle.clone(),
        ))?
        .build();

    tracing::debug!(actions = registry.len(), "action registry frozen");
    Ok(registry)
}
