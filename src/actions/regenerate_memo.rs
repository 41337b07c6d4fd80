use super::memo::{MemoMode, MemoOutcome, MemoPipeline, MemoTarget};
use super::name::ActionName;
use super::params::{normalize_domain, param_bool, param_str};
use super::result::ActionResult;
use super::traits::{Action, ActionRequest};
use crate::collaborators::types::company_key;
use async_trait::async_trait;

/// Rewrites the memo for one company. `force` (default true) clears the
/// ledger entry first; with `force=false` an already processed company is
/// left alone.
pub struct RegenerateMemoAction {
    pipeline: MemoPipeline,
}

impl RegenerateMemoAction {
    pub fn new(pipeline: MemoPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Action for RegenerateMemoAction {
    fn name(&self) -> ActionName {
        ActionName::RegenerateMemo
    }

    fn description(&self) -> &str {
        "Regenerate an investment memo for a specific company. Use when a memo needs to be redone."
    }

    fn parameter_hint(&self) -> Option<&str> {
        Some(r#"{"domain": "company.com", "company": "Company Name", "force": true}"#)
    }

    async fn execute(&self, request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
        let Some(identifier) = param_str(request.parameters, "domain")
            .or_else(|| param_str(request.parameters, "company"))
        else {
            return Ok(ActionResult::failure(
                "Missing domain or company name to regenerate",
            ));
        };
        let force = param_bool(request.parameters, "force", true);

        let lookup = normalize_domain(&identifier).unwrap_or_else(|| identifier.clone());
        let row = match self.pipeline.sheet().find_row(&lookup).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                return Ok(ActionResult::failure(format!(
                    "Company '{identifier}' not found in the sheet"
                )));
            }
            Err(e) => return Ok(ActionResult::failure(format!("Could not read the sheet: {e:#}"))),
        };

        let target = MemoTarget {
            company: row.company.clone(),
            domain: normalize_domain(&row.domain).unwrap_or_default(),
            row: Some(row.row),
        };
        let base = ActionResult::ok()
            .with("company", target.company.as_str())
            .with("domain", target.domain.as_str());

        let mode = if force {
            MemoMode::Regenerate
        } else {
            let key = company_key(&target.company, &target.domain);
            if self.pipeline.ledger().is_processed(&key).await? {
                return Ok(base.with("already_processed", true));
            }
            MemoMode::Batch
        };

        match self.pipeline.run(&target, mode).await {
            Ok(MemoOutcome::Written { url, document_id, .. }) => Ok(base
                .with("document_id", document_id)
                .with("document_url", url)),
            Ok(MemoOutcome::Skipped) => Ok(ActionResult::failure(format!(
                "A memo for {} is already being generated",
                target.company
            ))),
            Err(e) => {
                tracing::warn!(company = %target.company, "memo regeneration failed: {e:#}");
                Ok(ActionResult::failure(format!("{e:#}")))
            }
        }
    }

    fn format_response(&self, result: &ActionResult) -> String {
        if !result.success {
            return format!("Failed to regenerate memo: {}", result.error_text());
        }
        let company = result.text("company").unwrap_or("(unknown)");
        let domain = result.text("domain").unwrap_or("(no domain)");

        if result.flag("already_processed") {
            return format!(
                "**{company}** ({domain}) already has a memo. \
                 Ask again with \"force\" to overwrite it."
            );
        }

        format!(
            "Memo regenerated!\n\n\
             **Company:** {company}\n\
             **Domain:** {domain}\n\n\
             **New memo:** {}\n\n\
             Let me know if you need any other changes.",
            result.text("document_url").unwrap_or("(link unavailable)")
        )
    }
}
