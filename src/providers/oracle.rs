use super::traits::Provider;
use std::sync::Arc;

/// The generation oracle handed to the classifier and to content-producing
/// actions: a provider pinned to one model and a default temperature.
#[derive(Clone)]
pub struct Oracle {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl Oracle {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate text at the oracle's default temperature.
    pub async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.generate_with(prompt, self.temperature).await
    }

    pub async fn generate_with(&self, prompt: &str, temperature: f64) -> anyhow::Result<String> {
        tracing::debug!(
            provider = self.provider.name(),
            model = %self.model,
            prompt_chars = prompt.len(),
            "oracle generate"
        );
        self.provider
            .chat(prompt, &self.model, temperature)
            .await
    }

    /// Round-trip a trivial prompt. Used by the health-check action.
    pub async fn probe(&self) -> anyhow::Result<()> {
        self.provider.warmup().await?;
        let reply = self
            .generate_with("Reply with the single word OK.", 0.0)
            .await?;
        if reply.trim().is_empty() {
            anyhow::bail!("{} returned an empty probe reply", self.provider.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        reply: &'static str,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn chat_with_system(
            &self,
            _system_prompt: Option<&str>,
            _message: &str,
            model: &str,
            temperature: f64,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}|{model}|{temperature}", self.reply))
        }
    }

    #[tokio::test]
    async fn generate_uses_pinned_model_and_temperature() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            reply: "text",
        });
        let oracle = Oracle::new(provider.clone(), "m-1", 0.7);

        assert_eq!(oracle.generate("p").await.unwrap(), "text|m-1|0.7");
        assert_eq!(oracle.generate_with("p", 0.2).await.unwrap(), "text|m-1|0.2");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn probe_fails_on_blank_reply() {
        struct Blank;

        #[async_trait]
        impl Provider for Blank {
            fn name(&self) -> &str {
                "blank"
            }

            async fn chat_with_system(
                &self,
                _: Option<&str>,
                _: &str,
                _: &str,
                _: f64,
            ) -> anyhow::Result<String> {
                Ok("   ".into())
            }
        }

        let oracle = Oracle::new(Arc::new(Blank), "m", 0.1);
        assert!(oracle.probe().await.is_err());
    }
}
