use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("keel/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Shared HTTP client for the model oracle, Google collaborators and the
/// poller's gateway hop.
pub fn build_http_client() -> Client {
    build_http_client_with_timeout(DEFAULT_TIMEOUT_SECS)
}

pub fn build_http_client_with_timeout(timeout_secs: u64) -> Client {
    let builder = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90));

    match builder.build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("http client build failed, using defaults: {e}");
            Client::new()
        }
    }
}
