use super::add_company::{AddOutcome, CompanyAdder};
use super::name::ActionName;
use super::params::{param_str, param_u64};
use super::result::ActionResult;
use super::traits::{Action, ActionRequest};
use crate::collaborators::ScrapeSource;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const DEFAULT_BATCH: &str = "W26";
const MAX_PAGES: u64 = 5;
const LISTED_NAMES: usize = 10;

/// `w26` → `W26`; `None` unless a season letter followed by two digits.
fn normalize_batch(raw: &str) -> Option<String> {
    let batch = raw.trim().to_uppercase();
    let mut chars = batch.chars();
    let season = chars.next()?;
    let digits: String = chars.collect();
    (matches!(season, 'W' | 'S' | 'F' | 'X')
        && digits.len() == 2
        && digits.chars().all(|c| c.is_ascii_digit()))
    .then_some(batch)
}

pub struct ScrapeYcAction {
    scraper: Arc<dyn ScrapeSource>,
    adder: CompanyAdder,
}

impl ScrapeYcAction {
    pub fn new(scraper: Arc<dyn ScrapeSource>, adder: CompanyAdder) -> Self {
        Self { scraper, adder }
    }
}

#[async_trait]
impl Action for ScrapeYcAction {
    fn name(&self) -> ActionName {
        ActionName::ScrapeYc
    }

    fn description(&self) -> &str {
        "Scrape YC Bookface for companies in a specific batch and add them to the sheet. Default batch is W26."
    }

    fn parameter_hint(&self) -> Option<&str> {
        Some(r#"{"batch": "W26", "pages": 3}"#)
    }

    async fn execute(&self, request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
        let raw_batch =
            param_str(request.parameters, "batch").unwrap_or_else(|| DEFAULT_BATCH.into());
        let Some(batch) = normalize_batch(&raw_batch) else {
            return Ok(ActionResult::failure(format!(
                "'{raw_batch}' is not a batch id like W26"
            )));
        };
        let pages = param_u64(request.parameters, "pages")
            .map(|p| u32::try_from(p.clamp(1, MAX_PAGES)).unwrap_or(1));

        let companies = match self.scraper.list_companies(&batch, pages).await {
            Ok(companies) => companies,
            Err(e) => return Ok(ActionResult::failure(format!("Scrape failed: {e:#}"))),
        };

        let mut added = Vec::new();
        let mut skipped = 0u64;
        let mut errors = 0u64;
        for company in companies.iter().filter(|c| !c.name.is_empty()) {
            match self.adder.add(&company.name, &company.domain, &batch).await {
                Ok(AddOutcome::Added) => added.push(Value::from(company.name.as_str())),
                Ok(AddOutcome::AlreadyExists(_)) => skipped += 1,
                Err(e) => {
                    errors += 1;
                    tracing::warn!(company = %company.name, "failed to add scraped company: {e:#}");
                }
            }
        }

        tracing::info!(batch = %batch, found = companies.len(), added = added.len(), skipped, errors, "batch scraped");
        Ok(ActionResult::ok()
            .with("batch", batch)
            .with("found", companies.len())
            .with("added", added)
            .with("skipped", skipped)
            .with("errors", errors))
    }

    fn format_response(&self, result: &ActionResult) -> String {
        if !result.success {
            return format!("Failed to scrape YC: {}", result.error_text());
        }
        let batch = result.text("batch").unwrap_or(DEFAULT_BATCH);
        if result.count("found") == 0 {
            return format!("No {batch} companies found in the Bookface feed.");
        }

        let added: Vec<&str> = result
            .list("added")
            .into_iter()
            .filter_map(Value::as_str)
            .collect();
        let mut names = added
            .iter()
            .take(LISTED_NAMES)
            .map(|n| format!("  - {n}"))
            .collect::<Vec<_>>();
        if added.len() > LISTED_NAMES {
            names.push(format!("  - ... and {} more", added.len() - LISTED_NAMES));
        }
        let names = if names.is_empty() {
            "  (none)".to_string()
        } else {
            names.join("\n")
        };

        format!(
            "YC {batch} companies imported!\n\n\
             **Added:** {}\n\
             **Skipped (already exists):** {}\n\
             **Errors:** {}\n\n\
             **New companies:**\n{names}\n\n\
             Reply \"generate memos\" to create memos for the new companies.",
            added.len(),
            result.count("skipped"),
            result.count("errors"),
        )
    }
}
