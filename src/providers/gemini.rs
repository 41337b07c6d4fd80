//! Google Gemini provider (Generative Language API, API-key auth).

use super::gemini_types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};
use super::http_client::build_http_client;
use super::scrub::sanitize_api_error;
use super::traits::Provider;
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MAX_OUTPUT_TOKENS: u32 = 8192;

pub struct GeminiProvider {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    ///
    /// Key priority: explicit key, then `GEMINI_API_KEY`, then `GOOGLE_API_KEY`.
    pub fn new(api_key: Option<&str>) -> Self {
        let resolved_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());

        Self {
            api_key: resolved_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: build_http_client(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn build_request(
        system_prompt: Option<&str>,
        message: &str,
        temperature: f64,
    ) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(message.to_string()),
                }],
            }],
            system_instruction: system_prompt.map(|sys| Content {
                role: None,
                parts: vec![Part {
                    text: Some(sys.to_string()),
                }],
            }),
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }

    fn model_name(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn extract_text(result: &GenerateContentResponse) -> anyhow::Result<String> {
        let text = result
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "Gemini".into(),
            }
            .into());
        }

        Ok(text)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn chat_with_system(
        &self,
        system_prompt: Option<&str>,
        message: &str,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String> {
        let api_key = self.api_key.as_ref().ok_or_else(|| LlmError::Auth {
            provider: "Gemini".into(),
            message: "API key not set. Set GEMINI_API_KEY or provider.api_key in config.toml"
                .into(),
        })?;

        let url = format!(
            "{}/{}:generateContent",
            self.base_url,
            Self::model_name(model)
        );
        let request = Self::build_request(system_prompt, message, temperature);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request {
                provider: "Gemini".into(),
                message: sanitize_api_error(&e.to_string()),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Request {
                provider: "Gemini".into(),
                message: format!("{status}: {}", sanitize_api_error(&error_text)),
            }
            .into());
        }

        let result: GenerateContentResponse = response.json().await?;
        if let Some(err) = result.error.as_ref() {
            return Err(LlmError::Request {
                provider: "Gemini".into(),
                message: sanitize_api_error(&err.message),
            }
            .into());
        }

        Self::extract_text(&result)
    }

    async fn warmup(&self) -> anyhow::Result<()> {
        if self.api_key.is_none() {
            anyhow::bail!("Gemini API key not set");
        }
        Ok(())
    }
}
