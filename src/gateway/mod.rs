//! Axum HTTP surface: `GET /`, `GET /health`, `POST /email`, `POST /run`.
//!
//! Request bodies are capped at 64KB and every request is bounded by a 30s
//! timeout layer (the router applies its own, longer per-action timeout).

mod handlers;

use handlers::{handle_email, handle_health, handle_index, handle_run};

use crate::config::Config;
use crate::router::EmailRouter;
use anyhow::Result;
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout for the HTTP layer
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

pub const SERVICE_NAME: &str = "keel";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<EmailRouter>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(router: EmailRouter) -> Self {
        Self {
            router: Arc::new(router),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Batch runs outlive the default timeout; `/run` callers may need this raised.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// `POST /run` body; every field optional.
#[derive(Debug, Default, serde::Deserialize)]
pub struct RunBody {
    #[serde(default)]
    pub force: bool,
}

pub fn app(state: AppState) -> Router {
    let timeout = state.request_timeout;
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/email", post(handle_email))
        .route("/run", post(handle_run))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
}

/// Bind `host:port`, wire collaborators from `config` and serve.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    run_gateway_with_listener(host, listener, config).await
}

/// Run the HTTP gateway from a pre-bound listener.
pub async fn run_gateway_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    config: Config,
) -> Result<()> {
    let router = crate::app::build_email_router(&config).await?;
    let timeout = Duration::from_secs(
        REQUEST_TIMEOUT_SECS.max(config.gateway.action_timeout_secs),
    );
    let state = AppState::new(router).with_request_timeout(timeout);

    let port = listener.local_addr()?.port();
    tracing::info!(
        addr = %format!("{host}:{port}"),
        allowed_domains = ?state.router.allowlist().domains(),
        "gateway listening: GET /, GET /health, POST /email, POST /run"
    );
    serve(listener, state).await
}

pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> Result<()> {
    crate::health::mark_component_ok("gateway");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            crate::health::mark_component_error("gateway", "shutdown requested");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_body_limit_is_64kb() {
        assert_eq!(MAX_BODY_SIZE, 65_536);
    }

    #[test]
    fn run_body_fields_are_optional() {
        let parsed: RunBody = serde_json::from_str("{}").unwrap();
        assert!(!parsed.force);
        let parsed: RunBody = serde_json::from_str(r#"{"force": true}"#).unwrap();
        assert!(parsed.force);
    }
}
