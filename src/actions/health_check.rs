use super::name::ActionName;
use super::result::ActionResult;
use super::traits::{Action, ActionRequest};
use crate::collaborators::{DocumentStore, Ledger, SheetSource};
use crate::health;
use crate::providers::Oracle;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

pub struct HealthCheckAction {
    sheet: Arc<dyn SheetSource>,
    ledger: Arc<dyn Ledger>,
    documents: Arc<dyn DocumentStore>,
    oracle: Oracle,
}

impl HealthCheckAction {
    pub fn new(
        sheet: Arc<dyn SheetSource>,
        ledger: Arc<dyn Ledger>,
        documents: Arc<dyn DocumentStore>,
        oracle: Oracle,
    ) -> Self {
        Self {
            sheet,
            ledger,
            documents,
            oracle,
        }
    }
}

fn check(component: &str, outcome: anyhow::Result<()>) -> Value {
    health::record_probe(component, &outcome);
    match outcome {
        Ok(()) => json!({"component": component, "healthy": true}),
        Err(e) => {
            tracing::warn!(component, "health probe failed: {e:#}");
            json!({"component": component, "healthy": false, "error": format!("{e:#}")})
        }
    }
}

#[async_trait]
impl Action for HealthCheckAction {
    fn name(&self) -> ActionName {
        ActionName::HealthCheck
    }

    fn description(&self) -> &str {
        "Check that the sheet, ledger, document store and language model are reachable."
    }

    async fn execute(&self, _request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
        let (sheet, ledger, documents, oracle) = tokio::join!(
            self.sheet.probe(),
            self.ledger.probe(),
            self.documents.probe(),
            self.oracle.probe(),
        );
        let checks = vec![
            check("sheet", sheet),
            check("ledger", ledger),
            check("documents", documents),
            check("oracle", oracle),
        ];
        let healthy = checks.iter().filter(|c| c["healthy"] == true).count();

        Ok(ActionResult::ok()
            .with("healthy", healthy)
            .with("unhealthy", checks.len() - healthy)
            .with("checks", checks))
    }

    fn format_response(&self, result: &ActionResult) -> String {
        let mut lines = vec![format!(
            "Health check: {} healthy / {} unhealthy",
            result.count("healthy"),
            result.count("unhealthy")
        )];
        for check in result.list("checks") {
            let component = check["component"].as_str().unwrap_or("unknown");
            if check["healthy"] == true {
                lines.push(format!("- {component}: OK"));
            } else {
                let error = check["error"].as_str().unwrap_or("unknown error");
                lines.push(format!("- {component}: UNHEALTHY ({error})"));
            }
        }
        lines.join("\n")
    }
}
