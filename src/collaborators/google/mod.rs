//! Google Workspace collaborators over REST with a bearer token.

mod docs;
mod gmail;
mod sheets;

pub use docs::GoogleDocuments;
pub use gmail::{GmailClient, ParsedMail, parse_raw_message};
pub use sheets::GoogleSheet;

use crate::error::CollaboratorError;
use crate::providers::read_error_body;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

/// API roots, overridable so tests can point everything at one mock server.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub sheets: String,
    pub drive: String,
    pub docs: String,
    pub gmail: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            sheets: "https://sheets.googleapis.com".into(),
            drive: "https://www.googleapis.com".into(),
            docs: "https://docs.googleapis.com".into(),
            gmail: "https://gmail.googleapis.com".into(),
        }
    }
}

impl GoogleEndpoints {
    pub fn uniform(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            sheets: base.clone(),
            drive: base.clone(),
            docs: base.clone(),
            gmail: base,
        }
    }
}

/// Authenticated client shared by the Google collaborators.
#[derive(Clone)]
pub struct GoogleApi {
    client: Client,
    access_token: String,
    endpoints: GoogleEndpoints,
}

impl GoogleApi {
    pub fn new(client: Client, access_token: impl Into<String>, endpoints: GoogleEndpoints) -> Self {
        Self {
            client,
            access_token: access_token.into(),
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &GoogleEndpoints {
        &self.endpoints
    }

    /// `root` joined with percent-encoded path segments.
    pub fn url(root: &str, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = Url::parse(root)?;
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("cannot-be-a-base URL: {root}"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url).bearer_auth(&self.access_token)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url).bearer_auth(&self.access_token)
    }

    pub fn put(&self, url: Url) -> RequestBuilder {
        self.client.put(url).bearer_auth(&self.access_token)
    }

    /// Send and decode; a non-2xx status becomes [`CollaboratorError::Request`].
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        collaborator: &'static str,
        request: RequestBuilder,
    ) -> anyhow::Result<T> {
        let response = request.send().await.map_err(|e| CollaboratorError::Request {
            collaborator,
            status: 0,
            message: crate::providers::sanitize_api_error(&e.to_string()),
        })?;

        if !response.status().is_success() {
            let (status, message) = read_error_body(response).await;
            return Err(CollaboratorError::Request {
                collaborator,
                status,
                message,
            }
            .into());
        }

        response.json::<T>().await.map_err(|e| {
            CollaboratorError::Malformed {
                collaborator,
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_encodes_segments() {
        let url = GoogleApi::url(
            "https://sheets.googleapis.com",
            &["v4", "spreadsheets", "abc", "values", "Deal Flow!A:D"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/Deal%20Flow!A:D"
        );
    }

    #[test]
    fn uniform_endpoints_trim_slash() {
        let e = GoogleEndpoints::uniform("http://127.0.0.1:9999/");
        assert_eq!(e.gmail, "http://127.0.0.1:9999");
        assert_eq!(e.sheets, e.docs);
    }
}
