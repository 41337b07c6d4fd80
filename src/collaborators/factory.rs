use super::Collaborators;
use super::bookface::BookfaceClient;
use super::google::{GmailClient, GoogleApi, GoogleDocuments, GoogleEndpoints, GoogleSheet};
use super::memory::{MemoryDocumentStore, MemorySheet, StaticUpdatesSource};
use super::sqlite::{SqliteLedger, SqliteRelationshipStore, open_pool};
use crate::config::{BackendKind, Config, GoogleConfig};
use crate::error::CollaboratorError;
use crate::poller::Mailbox;
use crate::providers::{build_http_client, build_http_client_with_timeout, create_oracle};
use anyhow::Context;
use std::sync::Arc;

fn google_api(config: &GoogleConfig) -> anyhow::Result<GoogleApi> {
    let token = config
        .access_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or(CollaboratorError::NotConfigured {
            collaborator: "google",
            field: "google.access_token",
        })?;
    Ok(GoogleApi::new(
        build_http_client_with_timeout(60),
        token,
        GoogleEndpoints::default(),
    ))
}

/// Wire up the collaborator set for the configured backend.
///
/// Ledger and relationships always persist to SQLite; the remaining
/// collaborators come from Google or from process memory.
pub async fn build_collaborators(config: &Config) -> anyhow::Result<Collaborators> {
    let oracle = create_oracle(&config.provider)?;

    let pool = open_pool(&config.ledger.resolved_path())
        .await
        .context("open ledger database")?;
    let ledger = Arc::new(SqliteLedger::new(pool.clone(), &config.ledger.collection));
    let relationships = Arc::new(SqliteRelationshipStore::new(pool));
    let scraper = Arc::new(BookfaceClient::new(build_http_client(), &config.bookface));

    let collaborators = match config.backend {
        BackendKind::Memory => Collaborators {
            sheet: Arc::new(MemorySheet::new()),
            ledger,
            documents: Arc::new(MemoryDocumentStore::new()),
            scraper,
            updates: Arc::new(StaticUpdatesSource::new(Vec::new())),
            relationships,
            oracle,
        },
        BackendKind::Google => {
            let api = google_api(&config.google)?;
            let spreadsheet_id = config
                .google
                .spreadsheet_id
                .clone()
                .filter(|s| !s.trim().is_empty())
                .ok_or(CollaboratorError::NotConfigured {
                    collaborator: "sheets",
                    field: "google.spreadsheet_id",
                })?;
            Collaborators {
                sheet: Arc::new(GoogleSheet::new(
                    api.clone(),
                    spreadsheet_id,
                    config.google.sheet_range.clone(),
                )),
                ledger,
                documents: Arc::new(GoogleDocuments::new(
                    api.clone(),
                    config.google.drive_parent_folder_id.clone(),
                )),
                scraper,
                updates: Arc::new(GmailClient::new(api, config.email.agent_address.clone())),
                relationships,
                oracle,
            }
        }
    };

    tracing::info!(
        backend = ?config.backend,
        provider = collaborators.oracle.provider_name(),
        model = collaborators.oracle.model(),
        "collaborators ready"
    );
    Ok(collaborators)
}

/// The inbox the poller drains. Only Gmail is supported.
pub fn build_mailbox(config: &Config) -> anyhow::Result<Arc<dyn Mailbox>> {
    let api = google_api(&config.google)?;
    Ok(Arc::new(GmailClient::new(
        api,
        config.email.agent_address.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.ledger.path = dir.path().join("ledger.db").display().to_string();
        config.provider.api_key = Some("test-key".into());
        config
    }

    #[tokio::test]
    async fn memory_backend_builds() {
        let dir = tempfile::tempdir().unwrap();
        let collaborators = build_collaborators(&config_in(&dir)).await.unwrap();
        assert!(collaborators.sheet.list_rows().await.unwrap().is_empty());
        assert!(collaborators.ledger.try_claim("acme.com").await.unwrap());
    }

    #[tokio::test]
    async fn google_backend_needs_spreadsheet() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.backend = BackendKind::Google;
        config.google.access_token = Some("ya29.token".into());
        let err = build_collaborators(&config).await.err().unwrap();
        assert!(err.to_string().contains("spreadsheet_id"));
    }

    #[test]
    fn mailbox_needs_token() {
        let err = build_mailbox(&Config::default()).err().unwrap();
        assert!(err.to_string().contains("access_token"));
    }
}
