//! Inbound email → classification → action → reply text.

pub mod classifier;
pub mod command;
pub mod email;
pub mod extract;

pub use classifier::IntentClassifier;
pub use command::Command;
pub use email::{Allowlist, InboundEmail, extract_address};
pub use extract::{extract_json_object, str_field, string_list};

use crate::actions::{Action, ActionName, ActionRegistry, ActionRequest, ActionResult, Parameters};
use crate::config::Config;
use crate::error::ActionError;
use futures_util::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

pub const REJECTED_REPLY: &str = "Sorry, I only accept requests from approved domains.";
const CHAIN_SEPARATOR: &str = "\n\n---\n\n";

/// How a request ended, for logs and the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Rejected,
    NotUnderstood,
    Completed,
    /// The action ran and reported `success: false`.
    Failed,
    /// The action errored, panicked or timed out.
    Faulted,
}

#[derive(Debug, Clone)]
pub struct RouterReply {
    pub reply_text: String,
    pub action: ActionName,
    pub success: bool,
    pub outcome: RouteOutcome,
}

impl RouterReply {
    fn new(reply_text: String, action: ActionName, outcome: RouteOutcome) -> Self {
        Self {
            reply_text,
            action,
            success: outcome == RouteOutcome::Completed,
            outcome,
        }
    }
}

/// Stateless per call: holds only the frozen registry, the classifier and the
/// sender gate.
#[derive(Clone)]
pub struct EmailRouter {
    registry: Arc<ActionRegistry>,
    classifier: IntentClassifier,
    allowlist: Allowlist,
    action_timeout: Duration,
}

impl EmailRouter {
    pub fn new(
        registry: Arc<ActionRegistry>,
        classifier: IntentClassifier,
        allowlist: Allowlist,
    ) -> Self {
        Self {
            registry,
            classifier,
            allowlist,
            action_timeout: Duration::from_secs(600),
        }
    }

    /// Router over `registry` with the classifier, allowlist and timeout
    /// taken from `config`.
    pub fn from_config(config: &Config, registry: ActionRegistry, classifier: IntentClassifier) -> Self {
        let classifier = classifier
            .with_temperature(config.provider.classify_temperature)
            .with_thread_heuristic(config.email.thread_heuristic);
        Self::new(
            Arc::new(registry),
            classifier,
            Allowlist::new(&config.email.allowed_domains),
        )
        .with_action_timeout(Duration::from_secs(config.gateway.action_timeout_secs))
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }

    /// Always produces reply text. Nothing is classified or executed for a
    /// sender outside the allowlist.
    pub async fn handle(&self, email: &InboundEmail) -> RouterReply {
        if !self.allowlist.permits(email) {
            tracing::warn!(sender = %email.from, "rejected email from unapproved domain");
            return RouterReply::new(
                REJECTED_REPLY.to_string(),
                ActionName::Unknown,
                RouteOutcome::Rejected,
            );
        }

        let command = self.classifier.classify(&self.registry, email).await;
        tracing::info!(
            action = %command.action,
            sender = %email.from,
            also_do = ?command.also_do,
            "email classified"
        );

        let Some(action) = self.registry.get(command.action).cloned() else {
            return RouterReply::new(
                self.not_understood(&command),
                command.action,
                RouteOutcome::NotUnderstood,
            );
        };

        let mut reply = match self
            .execute(&action, &command.parameters, Some(email))
            .await
        {
            Ok(result) => {
                let outcome = if result.success {
                    RouteOutcome::Completed
                } else {
                    RouteOutcome::Failed
                };
                let text = render(action.as_ref(), &result);
                let mut reply = RouterReply::new(text, command.action, outcome);
                if result.success
                    && let Some(next) = command.also_do
                {
                    reply.reply_text.push_str(CHAIN_SEPARATOR);
                    reply
                        .reply_text
                        .push_str(&self.run_chained(next, &result, email).await);
                }
                reply
            }
            Err(e) => {
                tracing::error!(action = %command.action, "action faulted: {e:#}");
                RouterReply::new(
                    fault_reply(command.action),
                    command.action,
                    RouteOutcome::Faulted,
                )
            }
        };
        reply.reply_text = reply.reply_text.trim_end().to_string();
        reply
    }

    /// Run a registered action directly, bypassing classification. Timeouts
    /// and panics come back as `ActionError`s inside the `Err`.
    pub async fn run_action(
        &self,
        name: ActionName,
        parameters: &Parameters,
    ) -> anyhow::Result<ActionResult> {
        let action = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| ActionError::NotRegistered {
                name: name.to_string(),
            })?;
        self.execute(&action, parameters, None).await
    }

    /// Reply text for a result of `name`, as `handle` would produce it.
    pub fn render(&self, name: ActionName, result: &ActionResult) -> String {
        self.registry.get(name).map_or_else(
            || result.error_text().to_string(),
            |action| render(action.as_ref(), result),
        )
    }

    async fn execute(
        &self,
        action: &Arc<dyn Action>,
        parameters: &Parameters,
        email: Option<&InboundEmail>,
    ) -> anyhow::Result<ActionResult> {
        let request = ActionRequest { parameters, email };
        let name = action.name().to_string();
        let run = AssertUnwindSafe(action.execute(&request)).catch_unwind();

        match tokio::time::timeout(self.action_timeout, run).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ActionError::Panicked {
                name,
                message: panic_message(&*panic),
            }
            .into()),
            Err(_) => Err(ActionError::TimedOut {
                name,
                secs: self.action_timeout.as_secs(),
            }
            .into()),
        }
    }

    /// Parameters for the follow-up carry the company the first action
    /// touched, so "fix the domain, then regenerate" targets the same row.
    async fn run_chained(&self, next: ActionName, first: &ActionResult, email: &InboundEmail) -> String {
        let Some(action) = self.registry.get(next).cloned() else {
            return format!("(Follow-up action {next} is not available.)");
        };
        let mut parameters = Parameters::new();
        if next == ActionName::RegenerateMemo {
            for key in ["company", "domain"] {
                if let Some(value) = first.text(key) {
                    parameters.insert(key.into(), Value::String(value.to_string()));
                }
            }
        }

        tracing::info!(action = %next, "running chained action");
        match self.execute(&action, &parameters, Some(email)).await {
            Ok(result) => render(action.as_ref(), &result),
            Err(e) => {
                tracing::error!(action = %next, "chained action faulted: {e:#}");
                fault_reply(next)
            }
        }
    }

    fn not_understood(&self, command: &Command) -> String {
        let commands = self
            .registry
            .list()
            .map(|action| format!("- {}", action.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let interpretation = command
            .reasoning
            .as_deref()
            .map(|r| format!("**My interpretation:** {r}\n\n"))
            .unwrap_or_default();
        format!(
            "I received your email but couldn't identify a specific action to take. \
             Try rephrasing your request.\n\n{interpretation}\
             **Available commands:**\n{commands}\n\n\
             Just reply with what you'd like me to do."
        )
    }
}

/// `format_response` behind a panic guard so a reply always comes back.
fn render(action: &dyn Action, result: &ActionResult) -> String {
    std::panic::catch_unwind(AssertUnwindSafe(|| action.format_response(result))).unwrap_or_else(
        |panic| {
            tracing::error!(
                action = %action.name(),
                "format_response panicked: {}",
                panic_message(&*panic)
            );
            fault_reply(action.name())
        },
    )
}

fn fault_reply(action: ActionName) -> String {
    format!(
        "Something went wrong while running **{action}**. \
         The problem has been logged; please try again later."
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{Fixture, MockProvider};
    use crate::actions::{ActionRegistry, default_registry};
    use async_trait::async_trait;

    enum Behaviour {
        Succeed,
        Fail,
        Error,
        Panic,
        Hang,
    }

    struct Scripted(ActionName, Behaviour);

    #[async_trait]
    impl Action for Scripted {
        fn name(&self) -> ActionName {
            self.0
        }

        fn description(&self) -> &str {
            "scripted"
        }

        async fn execute(&self, request: &ActionRequest<'_>) -> anyhow::Result<ActionResult> {
            match self.1 {
                Behaviour::Succeed => Ok(ActionResult::ok()
                    .with("company", "Acme")
                    .with("seen", request.parameters.len())),
                Behaviour::Fail => Ok(ActionResult::failure("no domain")),
                Behaviour::Error => anyhow::bail!("sheet exploded"),
                Behaviour::Panic => panic!("index out of bounds"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(ActionResult::ok())
                }
            }
        }

        fn format_response(&self, result: &ActionResult) -> String {
            if result.success {
                format!("{} ok for {}", self.0, result.text("company").unwrap_or("?"))
            } else {
                format!("{} failed: {}", self.0, result.error_text())
            }
        }
    }

    fn build(provider: MockProvider, actions: Vec<Scripted>) -> (EmailRouter, Fixture) {
        let fixture = Fixture::new(provider);
        let mut builder = ActionRegistry::builder();
        for action in actions {
            builder = builder.register(action).unwrap();
        }
        let router = EmailRouter::new(
            Arc::new(builder.build()),
            IntentClassifier::new(fixture.collaborators.oracle.clone()),
            Allowlist::new(["friale.com"]),
        )
        .with_action_timeout(Duration::from_millis(50));
        (router, fixture)
    }

    fn email() -> InboundEmail {
        InboundEmail::new("Nick <nick@friale.com>", "keel@friale.com", "hi", "do it")
    }

    #[tokio::test]
    async fn disallowed_sender_is_rejected_before_classification() {
        let (router, fixture) = build(
            MockProvider::replying(r#"{"action": "HEALTH_CHECK"}"#),
            vec![Scripted(ActionName::HealthCheck, Behaviour::Succeed)],
        );
        let reply = router
            .handle(&InboundEmail::new("x@evil.io", "", "status", "health"))
            .await;
        assert_eq!(reply.outcome, RouteOutcome::Rejected);
        assert_eq!(reply.reply_text, REJECTED_REPLY);
        assert_eq!(fixture.provider.calls(), 0);
    }

    #[tokio::test]
    async fn unregistered_action_is_not_understood() {
        let (router, _fixture) = build(
            MockProvider::replying(r#"{"action": "SCRAPE_YC", "reasoning": "wants YC"}"#),
            vec![Scripted(ActionName::HealthCheck, Behaviour::Succeed)],
        );
        let reply = router.handle(&email()).await;
        assert_eq!(reply.outcome, RouteOutcome::NotUnderstood);
        assert!(!reply.success);
        assert!(reply.reply_text.contains("couldn't identify"));
        assert!(reply.reply_text.contains("- scripted"));
    }

    #[tokio::test]
    async fn failed_result_is_rendered_by_the_action() {
        let (router, _fixture) = build(
            MockProvider::replying(r#"{"action": "ADD_COMPANY"}"#),
            vec![Scripted(ActionName::AddCompany, Behaviour::Fail)],
        );
        let reply = router.handle(&email()).await;
        assert_eq!(reply.outcome, RouteOutcome::Failed);
        assert_eq!(reply.reply_text, "ADD_COMPANY failed: no domain");
    }

    #[tokio::test]
    async fn errors_panics_and_timeouts_become_generic_replies() {
        for behaviour in [Behaviour::Error, Behaviour::Panic, Behaviour::Hang] {
            let (router, _fixture) = build(
                MockProvider::replying(r#"{"action": "GENERATE_MEMOS"}"#),
                vec![Scripted(ActionName::GenerateMemos, behaviour)],
            );
            let reply = router.handle(&email()).await;
            assert_eq!(reply.outcome, RouteOutcome::Faulted);
            assert!(reply.reply_text.starts_with("Something went wrong while running **GENERATE_MEMOS**"));
            assert!(!reply.reply_text.contains("sheet exploded"));
        }
    }

    #[tokio::test]
    async fn chained_action_runs_only_after_success() {
        let decision = r#"{"action": "UPDATE_COMPANY", "also_do": "REGENERATE_MEMO"}"#;
        let (router, _fixture) = build(
            MockProvider::replying(decision),
            vec![
                Scripted(ActionName::UpdateCompany, Behaviour::Succeed),
                Scripted(ActionName::RegenerateMemo, Behaviour::Succeed),
            ],
        );
        let reply = router.handle(&email()).await;
        assert!(reply.success);
        assert_eq!(
            reply.reply_text,
            "UPDATE_COMPANY ok for Acme\n\n---\n\nREGENERATE_MEMO ok for Acme"
        );

        let (router, _fixture) = build(
            MockProvider::replying(decision),
            vec![
                Scripted(ActionName::UpdateCompany, Behaviour::Fail),
                Scripted(ActionName::RegenerateMemo, Behaviour::Panic),
            ],
        );
        let reply = router.handle(&email()).await;
        assert_eq!(reply.reply_text, "UPDATE_COMPANY failed: no domain");
    }

    #[tokio::test]
    async fn run_action_rejects_unregistered_names() {
        let fixture = Fixture::new(MockProvider::replying("OK"));
        let router = EmailRouter::new(
            Arc::new(default_registry(&fixture.collaborators).unwrap()),
            IntentClassifier::new(fixture.collaborators.oracle.clone()),
            Allowlist::default(),
        );
        let err = router
            .run_action(ActionName::Unknown, &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ActionError>(),
            Some(ActionError::NotRegistered { .. })
        ));

        let result = router
            .run_action(ActionName::GenerateMemos, &Parameters::new())
            .await
            .unwrap();
        assert!(result.success);
    }
}
