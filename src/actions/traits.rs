use super::name::ActionName;
use super::params::Parameters;
use super::result::ActionResult;
use crate::router::InboundEmail;
use async_trait::async_trait;

/// What an action gets to read: the classifier's parameters and, when the
/// run came in by email, the email itself.
#[derive(Debug, Clone, Copy)]
pub struct ActionRequest<'a> {
    pub parameters: &'a Parameters,
    pub email: Option<&'a InboundEmail>,
}

impl<'a> ActionRequest<'a> {
    pub fn new(parameters: &'a Parameters) -> Self {
        Self {
            parameters,
            email: None,
        }
    }

    pub fn with_email(parameters: &'a Parameters, email: &'a InboundEmail) -> Self {
        Self {
            parameters,
            email: Some(email),
        }
    }

    /// Subject and body joined, for actions that fall back to free text.
    pub fn email_text(&self) -> String {
        self.email
            .map(|e| format!("{}\n{}", e.subject, e.body))
            .unwrap_or_default()
    }
}

/// A named unit of business logic the router can dispatch to.
///
/// `execute` returns `Ok(ActionResult { success: false, .. })` for validation
/// and expected collaborator failures; `Err` is reserved for faults the
/// router should answer with a generic apology.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> ActionName;

    /// One line, shown to the classifier and in help replies.
    fn description(&self) -> &str;

    /// Expected parameter shape, e.g. `{"company": "...", "domain": "..."}`.
    fn parameter_hint(&self) -> Option<&str> {
        None
    }

    async fn execute(&self, request: &ActionRequest<'_>) -> anyhow::Result<ActionResult>;

    /// Total: must produce reply text for both success and failure results.
    fn format_response(&self, result: &ActionResult) -> String;
}
