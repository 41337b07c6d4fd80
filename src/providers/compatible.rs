//! Generic OpenAI-compatible provider.
//! Most hosted model APIs follow the same `/chat/completions` format, so one
//! implementation covers OpenAI, OpenRouter and self-hosted gateways.

use super::http_client::build_http_client;
use super::scrub::sanitize_api_error;
use super::traits::Provider;
use crate::error::LlmError;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    /// Pre-computed chat completions URL.
    chat_url: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let chat_url = if base_url.ends_with("chat/completions") {
            base_url.clone()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            name: name.to_string(),
            base_url,
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToString::to_string),
            chat_url,
            client: build_http_client(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_with_system(
        &self,
        system_prompt: Option<&str>,
        message: &str,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(LlmError::Auth {
                provider: self.name.clone(),
                message: format!(
                    "{} API key not set. Set KEEL_API_KEY or provider.api_key in config.toml",
                    self.name
                ),
            }
            .into());
        };

        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system_prompt {
            messages.push(Message {
                role: "system",
                content: sys.to_string(),
            });
        }
        messages.push(Message {
            role: "user",
            content: message.to_string(),
        });

        let request = ChatRequest {
            model: model.to_string(),
            messages,
            temperature,
        };

        let response = self
            .client
            .post(&self.chat_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{} chat completions request failed", self.name))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(LlmError::Request {
                provider: self.name.clone(),
                message: format!("{status}: {}", sanitize_api_error(&error)),
            }
            .into());
        }

        let chat: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("{} chat completions JSON decode failed", self.name))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                LlmError::EmptyResponse {
                    provider: self.name.clone(),
                }
                .into()
            })
    }

    async fn warmup(&self) -> anyhow::Result<()> {
        if self.api_key.is_none() {
            anyhow::bail!("{} API key not set", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn strips_trailing_slash() {
        let p = OpenAiCompatibleProvider::new("test", "https://example.com/v1/", None);
        assert_eq!(p.base_url, "https://example.com/v1");
        assert_eq!(p.chat_url, "https://example.com/v1/chat/completions");
    }

    #[test]
    fn blank_key_is_treated_as_missing() {
        let p = OpenAiCompatibleProvider::new("test", "https://example.com", Some("  "));
        assert!(p.api_key.is_none());
    }

    #[tokio::test]
    async fn chat_fails_without_key() {
        let p = OpenAiCompatibleProvider::new("OpenRouter", "https://openrouter.ai/api/v1", None);
        let err = p
            .chat_with_system(None, "hello", "model", 0.1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("OpenRouter API key not set"));
    }

    #[test]
    fn response_deserializes() {
        let json = r#"{"choices":[{"message":{"content":"Hello!"}}]}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("Hello!"));
    }

    #[tokio::test]
    async fn chat_round_trip_against_mock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "memo body"}}]
            })))
            .mount(&server)
            .await;

        let p = OpenAiCompatibleProvider::new("Mock", &server.uri(), Some("key-1"));
        let text = p
            .chat_with_system(Some("system"), "write", "gpt-4o-mini", 0.7)
            .await
            .unwrap();
        assert_eq!(text, "memo body");
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": []
            })))
            .mount(&server)
            .await;

        let p = OpenAiCompatibleProvider::new("Mock", &server.uri(), Some("key"));
        let err = p.chat("hi", "m", 0.1).await.unwrap_err();
        assert!(err.to_string().contains("empty response"));
    }

    #[tokio::test]
    async fn chat_error_messages_redact_sensitive_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                "{\"error\":\"invalid credentials api_key=raw-secret-123\"}",
            ))
            .mount(&server)
            .await;

        let p = OpenAiCompatibleProvider::new("Mock", &server.uri(), Some("key"));
        let err = p.chat("hello", "m", 0.1).await.unwrap_err().to_string();
        assert!(!err.contains("raw-secret-123"));
        assert!(err.contains("[REDACTED]"));
    }
}
