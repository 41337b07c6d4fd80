use super::compatible::OpenAiCompatibleProvider;
use super::gemini::GeminiProvider;
use super::http_client::build_http_client_with_timeout;
use super::oracle::Oracle;
use super::traits::Provider;
use crate::config::ProviderConfig;
use crate::error::LlmError;
use std::sync::Arc;

/// Resolve an API key: explicit config value first, then the provider's own env var.
pub fn resolve_api_key(name: &str, configured: Option<&str>) -> Option<String> {
    if let Some(key) = configured.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    let env_var = match name {
        "openai" => "OPENAI_API_KEY",
        "openrouter" => "OPENROUTER_API_KEY",
        _ => return None,
    };
    std::env::var(env_var).ok().filter(|k| !k.is_empty())
}

pub fn create_provider(config: &ProviderConfig) -> anyhow::Result<Box<dyn Provider>> {
    let name = config.name.trim();
    let api_key = resolve_api_key(name, config.api_key.as_deref());
    let client = build_http_client_with_timeout(config.timeout_secs);

    match name {
        "gemini" | "google" | "google-gemini" => Ok(Box::new(
            GeminiProvider::new(api_key.as_deref()).with_client(client),
        )),
        "openai" => Ok(Box::new(
            OpenAiCompatibleProvider::new("OpenAI", "https://api.openai.com/v1", api_key.as_deref())
                .with_client(client),
        )),
        "openrouter" => Ok(Box::new(
            OpenAiCompatibleProvider::new(
                "OpenRouter",
                "https://openrouter.ai/api/v1",
                api_key.as_deref(),
            )
            .with_client(client),
        )),
        _ => {
            if let Some(base_url) = name.strip_prefix("custom:")
                && !base_url.trim().is_empty()
            {
                return Ok(Box::new(
                    OpenAiCompatibleProvider::new("Custom", base_url.trim(), api_key.as_deref())
                        .with_client(client),
                ));
            }
            Err(LlmError::UnknownProvider(name.to_string()).into())
        }
    }
}

/// Build the oracle used for memo and digest generation.
pub fn create_oracle(config: &ProviderConfig) -> anyhow::Result<Oracle> {
    let provider: Arc<dyn Provider> = Arc::from(create_provider(config)?);
    Ok(Oracle::new(provider, config.model.clone(), config.temperature))
}
