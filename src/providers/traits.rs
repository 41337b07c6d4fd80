use async_trait::async_trait;

/// A text-generation backend. The rest of the crate only sees it through
/// [`super::Oracle`], which pins the model and temperature.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name used in errors and health output.
    fn name(&self) -> &str;

    async fn chat(&self, message: &str, model: &str, temperature: f64) -> anyhow::Result<String> {
        self.chat_with_system(None, message, model, temperature)
            .await
    }

    async fn chat_with_system(
        &self,
        system_prompt: Option<&str>,
        message: &str,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String>;

    /// Cheap reachability check. Default is a no-op; providers with HTTP
    /// clients should override.
    async fn warmup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingProvider {
        seen: Mutex<Vec<(Option<String>, String)>>,
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn chat_with_system(
            &self,
            system_prompt: Option<&str>,
            message: &str,
            _model: &str,
            _temperature: f64,
        ) -> anyhow::Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((system_prompt.map(str::to_string), message.to_string()));
            Ok("ok".into())
        }
    }

    #[tokio::test]
    async fn chat_delegates_without_system_prompt() {
        let provider = RecordingProvider {
            seen: Mutex::new(Vec::new()),
        };
        let reply = provider.chat("hello", "model", 0.2).await.unwrap();
        assert_eq!(reply, "ok");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(None, "hello".to_string())]);
    }

    #[tokio::test]
    async fn default_warmup_is_noop() {
        let provider = RecordingProvider {
            seen: Mutex::new(Vec::new()),
        };
        provider.warmup().await.unwrap();
        assert!(provider.seen.lock().unwrap().is_empty());
    }
}
