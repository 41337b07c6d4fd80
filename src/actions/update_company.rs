use super::name::ActionName;
use super::params::{normalize_domain, param_str};
use super::result::ActionResult;
use super::traits::{Action, ActionRequest};
use crate::collaborators::types::{SheetField, company_key};
use crate::collaborators::{Ledger, SheetSource};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Corrects a row's domain or name. A corrected row that already had a
/// status is sent back to the batch queue and its old ledger entry dropped,
/// so the next run writes a memo for the right company.
pub struct UpdateCompanyAction {
    sheet: Arc<dyn SheetSource>,
    ledger: Arc<dyn Ledger>,
}

impl UpdateCompanyAction {
    pub fn new(sheet: Arc<dyn SheetSource>, ledger: Arc<dyn Ledger>) -> Self {
        Self { sheet, ledger }
    }
}

#[async_trait]
impl Action for UpdateCompanyAction {
    fn name(&self) -> ActionName {
        ActionName::UpdateCompany
    }

    fn description(&self) -> &str {
        "Update/correct a company's domain or name. Use when someone provides a correction like \"Domain is X\" or \"The domain for Y should be Z\"."
    }

    fn parameter_hint(&self) -> Option<&str> {
        Some(r#"{"company": "Company Name", "new_domain": "correct-domain.com", "new_name": "optional"}"#)
    }

    async fn execute(&self, request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
        let Some(company) = param_str(request.parameters, "company") else {
            return Ok(ActionResult::failure("Missing company name to update"));
        };
        let raw_domain = param_str(request.parameters, "new_domain")
            .or_else(|| param_str(request.parameters, "domain"));
        let new_name = param_str(request.parameters, "new_name");

        if raw_domain.is_none() && new_name.is_none() {
            return Ok(ActionResult::failure("Missing new domain or name to update"));
        }
        let new_domain = match raw_domain.as_deref() {
            Some(raw) => match normalize_domain(raw) {
                Some(d) => Some(d),
                None => {
                    return Ok(ActionResult::failure(format!(
                        "'{raw}' does not look like a domain"
                    )));
                }
            },
            None => None,
        };

        let row = match self.sheet.find_row(&company).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                return Ok(ActionResult::failure(format!(
                    "No company matching '{company}' found in the sheet"
                )));
            }
            Err(e) => return Ok(ActionResult::failure(format!("Could not read the sheet: {e:#}"))),
        };

        let mut changes = Vec::new();
        if let Some(domain) = new_domain.filter(|d| normalize_domain(&row.domain).as_deref() != Some(d)) {
            if let Err(e) = self
                .sheet
                .update_row_field(row.row, SheetField::Domain, &domain)
                .await
            {
                return Ok(ActionResult::failure(format!("Could not update the sheet: {e:#}")));
            }
            let old = if row.domain.is_empty() { "(none)" } else { row.domain.as_str() };
            changes.push(format!("Domain: {old} → {domain}"));
        }
        if let Some(name) = new_name.filter(|n| !n.eq(&row.company)) {
            if let Err(e) = self
                .sheet
                .update_row_field(row.row, SheetField::Company, &name)
                .await
            {
                return Ok(ActionResult::failure(format!("Could not update the sheet: {e:#}")));
            }
            changes.push(format!("Name: {} → {name}", row.company));
        }

        if !changes.is_empty() {
            let old_key = company_key(
                &row.company,
                &normalize_domain(&row.domain).unwrap_or_default(),
            );
            if let Err(e) = self.ledger.clear(&old_key).await {
                tracing::warn!(key = %old_key, "failed to clear ledger entry: {e:#}");
            }
            if !row.status.trim().is_empty() {
                match self
                    .sheet
                    .update_row_field(row.row, SheetField::Status, "")
                    .await
                {
                    Ok(()) => changes.push("Status cleared for reprocessing".to_string()),
                    Err(e) => tracing::warn!(row = row.row, "failed to clear status: {e:#}"),
                }
            }
        }

        tracing::info!(company = %row.company, row = row.row, changes = changes.len(), "company updated");
        Ok(ActionResult::ok()
            .with("company", row.company)
            .with("row", row.row)
            .with(
                "changes",
                changes.into_iter().map(Value::from).collect::<Vec<_>>(),
            ))
    }

    fn format_response(&self, result: &ActionResult) -> String {
        if !result.success {
            return format!("Failed to update company: {}", result.error_text());
        }
        let changes: Vec<&str> = result
            .list("changes")
            .into_iter()
            .filter_map(Value::as_str)
            .collect();
        let changes = if changes.is_empty() {
            "  - No changes needed".to_string()
        } else {
            changes
                .iter()
                .map(|c| format!("  - {c}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "Company updated!\n\n**Company:** {}\n**Changes:**\n{changes}",
            result.text("company").unwrap_or("(unknown)")
        )
    }
}
