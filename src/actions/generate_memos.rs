use super::memo::{MemoMode, MemoOutcome, MemoPipeline, MemoTarget};
use super::name::ActionName;
use super::params::{normalize_domain, param_bool};
use super::result::ActionResult;
use super::traits::{Action, ActionRequest};
use crate::collaborators::types::{STATUS_ERROR, SheetField};
use async_trait::async_trait;

/// Batch trigger over the sheet. One row's failure is counted and the batch
/// moves on.
pub struct GenerateMemosAction {
    pipeline: MemoPipeline,
}

impl GenerateMemosAction {
    pub fn new(pipeline: MemoPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Action for GenerateMemosAction {
    fn name(&self) -> ActionName {
        ActionName::GenerateMemos
    }

    fn description(&self) -> &str {
        "Generate investment memos for new companies in the sheet"
    }

    fn parameter_hint(&self) -> Option<&str> {
        Some(r#"{"force": false}"#)
    }

    async fn execute(&self, request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
        let force = param_bool(request.parameters, "force", false);
        let sheet = self.pipeline.sheet();

        let rows = if force {
            sheet.list_rows().await
        } else {
            sheet.list_unprocessed_rows().await
        };
        let rows = match rows {
            Ok(rows) => rows
                .into_iter()
                .filter(|r| !r.company.trim().is_empty())
                .collect::<Vec<_>>(),
            Err(e) => return Ok(ActionResult::failure(format!("Could not read the sheet: {e:#}"))),
        };

        let mode = if force {
            MemoMode::Regenerate
        } else {
            MemoMode::Batch
        };
        let (mut processed, mut skipped, mut errors) = (0u64, 0u64, 0u64);

        for row in &rows {
            let target = MemoTarget {
                company: row.company.trim().to_string(),
                domain: normalize_domain(&row.domain).unwrap_or_default(),
                row: Some(row.row),
            };
            match self.pipeline.run(&target, mode).await {
                Ok(MemoOutcome::Written { .. }) => processed += 1,
                Ok(MemoOutcome::Skipped) => skipped += 1,
                Err(e) => {
                    errors += 1;
                    tracing::error!(company = %target.company, row = row.row, "memo failed: {e:#}");
                    if let Err(status_err) = sheet
                        .update_row_field(row.row, SheetField::Status, STATUS_ERROR)
                        .await
                    {
                        tracing::warn!(row = row.row, "failed to flag row: {status_err:#}");
                    }
                }
            }
        }

        tracing::info!(processed, skipped, errors, force, "memo batch finished");
        Ok(ActionResult::ok()
            .with("attempted", rows.len())
            .with("processed", processed)
            .with("skipped", skipped)
            .with("errors", errors)
            .with("force", force))
    }

    fn format_response(&self, result: &ActionResult) -> String {
        if !result.success {
            return format!("Failed to generate memos: {}", result.error_text());
        }
        if result.count("attempted") == 0 {
            return "No new companies to process. All companies in the sheet have already been processed."
                .to_string();
        }

        let mut reply = format!(
            "Done! Here's what happened:\n\n\
             - Memos created: {}\n\
             - Skipped (already processed): {}\n\
             - Errors: {}",
            result.count("processed"),
            result.count("skipped"),
            result.count("errors"),
        );
        if result.count("errors") > 0 {
            reply.push_str(
                "\n\nFailed rows were marked \"Error\" in the sheet and will be retried on the next run.",
            );
        }
        reply
    }
}
