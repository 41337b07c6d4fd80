pub mod dispatch;

use crate::actions::default_registry;
use crate::collaborators::build_collaborators;
use crate::config::Config;
use crate::router::{EmailRouter, IntentClassifier};

/// Collaborators, registry, classifier and allowlist wired from `config`.
pub async fn build_email_router(config: &Config) -> anyhow::Result<EmailRouter> {
    let collaborators = build_collaborators(config).await?;
    let registry = default_registry(&collaborators)?;
    let classifier = IntentClassifier::new(collaborators.oracle.clone());
    Ok(EmailRouter::from_config(config, registry, classifier))
}
