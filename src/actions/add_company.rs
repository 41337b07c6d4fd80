use super::name::ActionName;
use super::params::{find_domain_in_text, normalize_domain, param_str};
use super::result::ActionResult;
use super::traits::{Action, ActionRequest};
use crate::collaborators::SheetSource;
use crate::collaborators::types::SheetRow;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const SOURCE_EMAIL: &str = "email";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyExists(SheetRow),
}

/// Check-then-append against the sheet, serialized so two concurrent adds of
/// the same company cannot both append.
#[derive(Clone)]
pub struct CompanyAdder {
    sheet: Arc<dyn SheetSource>,
    lock: Arc<Mutex<()>>,
}

impl CompanyAdder {
    pub fn new(sheet: Arc<dyn SheetSource>) -> Self {
        Self {
            sheet,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn add(&self, company: &str, domain: &str, source: &str) -> anyhow::Result<AddOutcome> {
        let _guard = self.lock.lock().await;
        let rows = self.sheet.list_rows().await?;

        let existing = rows.iter().find(|row| {
            let same_domain = !domain.is_empty()
                && normalize_domain(&row.domain).as_deref() == Some(domain);
            let same_name = !company.is_empty() && row.company.trim().eq_ignore_ascii_case(company);
            same_domain || same_name
        });
        if let Some(row) = existing {
            return Ok(AddOutcome::AlreadyExists(row.clone()));
        }

        self.sheet.append_row(company, domain, source).await?;
        Ok(AddOutcome::Added)
    }
}

/// `acme.com` → `Acme`.
pub fn company_from_domain(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or(domain);
    let mut chars = label.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

pub struct AddCompanyAction {
    adder: CompanyAdder,
}

impl AddCompanyAction {
    pub fn new(adder: CompanyAdder) -> Self {
        Self { adder }
    }
}

#[async_trait]
impl Action for AddCompanyAction {
    fn name(&self) -> ActionName {
        ActionName::AddCompany
    }

    fn description(&self) -> &str {
        "Add a new company to the deal flow spreadsheet. Extract company name and domain from the email."
    }

    fn parameter_hint(&self) -> Option<&str> {
        Some(r#"{"company": "Company Name", "domain": "company.com"}"#)
    }

    async fn execute(&self, request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
        let company = param_str(request.parameters, "company");
        let raw_domain = param_str(request.parameters, "domain");

        let domain = match raw_domain.as_deref() {
            Some(raw) => match normalize_domain(raw) {
                Some(domain) => domain,
                None => {
                    return Ok(ActionResult::failure(format!(
                        "'{raw}' does not look like a domain"
                    )));
                }
            },
            None => match find_domain_in_text(&request.email_text()) {
                Some(domain) => domain,
                None => {
                    return Ok(ActionResult::failure(match &company {
                        Some(company) => format!(
                            "No domain found for {company}. Reply with the company website, e.g. acme.com"
                        ),
                        None => "Missing company name or domain".to_string(),
                    }));
                }
            },
        };
        let company = company.unwrap_or_else(|| company_from_domain(&domain));
        let source = param_str(request.parameters, "source").unwrap_or_else(|| SOURCE_EMAIL.into());

        let result = ActionResult::ok()
            .with("company", company.as_str())
            .with("domain", domain.as_str());

        match self.adder.add(&company, &domain, &source).await {
            Ok(AddOutcome::Added) => {
                tracing::info!(company = %company, domain = %domain, "company added");
                Ok(result.with("already_exists", false))
            }
            Ok(AddOutcome::AlreadyExists(row)) => Ok(result
                .with("already_exists", true)
                .with("existing_company", row.company)
                .with("existing_domain", row.domain)
                .with("row", row.row)),
            Err(e) => Ok(ActionResult::failure(format!("Could not update the sheet: {e:#}"))),
        }
    }

    fn format_response(&self, result: &ActionResult) -> String {
        if !result.success {
            return format!("Failed to add company: {}", result.error_text());
        }

        let company = result.text("company").unwrap_or("(unknown)");
        let domain = result.text("domain").unwrap_or("(none)");

        if result.flag("already_exists") {
            let existing = result.text("existing_company").unwrap_or(company);
            let existing_domain = result.text("existing_domain").unwrap_or("(none)");
            return format!(
                "**{existing}** ({existing_domain}) already exists in the deal flow sheet. Nothing was added."
            );
        }

        format!(
            "Company added to deal flow!\n\n\
             **Company:** {company}\n\
             **Domain:** {domain}\n\n\
             The memo will be generated on the next run. Reply \"generate memos\" to process it now."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{Fixture, MockProvider, params};
    use crate::router::InboundEmail;
    use serde_json::json;

    fn action(fixture: &Fixture) -> AddCompanyAction {
        AddCompanyAction::new(CompanyAdder::new(fixture.collaborators.sheet.clone()))
    }

    #[tokio::test]
    async fn adds_once_then_reports_existing() {
        let fixture = Fixture::new(MockProvider::replying("x"));
        let action = action(&fixture);
        let p = params(json!({"company": "Acme Inc", "domain": "https://www.Acme.com/about"}));

        let first = action.execute(&ActionRequest::new(&p)).await.unwrap();
        assert!(first.success);
        assert!(!first.flag("already_exists"));
        assert!(action.format_response(&first).contains("Company added"));

        let second = action.execute(&ActionRequest::new(&p)).await.unwrap();
        assert!(second.success);
        assert!(second.flag("already_exists"));
        assert!(action.format_response(&second).contains("already exists"));

        let rows = fixture.sheet.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].domain, "acme.com");
        assert_eq!(rows[0].status, "New");
    }

    #[tokio::test]
    async fn domain_falls_back_to_email_text() {
        let fixture = Fixture::new(MockProvider::replying("x"));
        let p = params(json!({"company": "Acme Inc"}));
        let email = InboundEmail::new("nick@friale.com", "", "Add company", "Add Acme Inc (acme.com)");
        let result = action(&fixture)
            .execute(&ActionRequest::with_email(&p, &email))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.text("domain"), Some("acme.com"));
    }

    #[tokio::test]
    async fn invalid_or_missing_domain_is_a_failure_result() {
        let fixture = Fixture::new(MockProvider::replying("x"));
        let action = action(&fixture);

        let bad = params(json!({"company": "Acme", "domain": "not a domain"}));
        let result = action.execute(&ActionRequest::new(&bad)).await.unwrap();
        assert!(!result.success);
        assert!(action.format_response(&result).starts_with("Failed to add company"));

        let empty = params(json!({}));
        let result = action.execute(&ActionRequest::new(&empty)).await.unwrap();
        assert_eq!(result.error_text(), "Missing company name or domain");
        assert!(fixture.sheet.snapshot().is_empty());
    }

    #[tokio::test]
    async fn company_name_derived_from_domain() {
        let fixture = Fixture::new(MockProvider::replying("x"));
        let p = params(json!({"domain": "globex.io"}));
        let result = action(&fixture)
            .execute(&ActionRequest::new(&p))
            .await
            .unwrap();
        assert_eq!(result.text("company"), Some("Globex"));
    }

    #[tokio::test]
    async fn concurrent_adds_append_once() {
        let fixture = Fixture::new(MockProvider::replying("x"));
        let adder = CompanyAdder::new(fixture.collaborators.sheet.clone());
        let (a, b) = tokio::join!(
            adder.add("Acme", "acme.com", "email"),
            adder.add("Acme", "acme.com", "email")
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(
            outcomes.iter().filter(|o| **o == AddOutcome::Added).count(),
            1
        );
        assert_eq!(fixture.sheet.snapshot().len(), 1);
    }
}
