//! Per-call deadline for any provider.
//!
//! A run waits on each backend call; without a deadline a hung endpoint
//! stalls the whole run. `DeadlineProvider` turns an expired call into
//! `ProviderError::Timeout`, which the agent reports as a backend-error
//! message.

use async_trait::async_trait;
use crewloop_core::error::ProviderError;
use crewloop_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Wraps a provider and bounds every `complete` call.
pub struct DeadlineProvider {
    inner: Arc<dyn Provider>,
    timeout: Duration,
}

impl DeadlineProvider {
    pub fn new(inner: Arc<dyn Provider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Wrap with the default deadline (120s).
    pub fn with_default(inner: Arc<dyn Provider>) -> Self {
        Self::new(inner, Duration::from_secs(120))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Provider for DeadlineProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    provider = %self.inner.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Provider call exceeded deadline"
                );
                Err(ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}ms",
                    self.inner.name(),
                    self.timeout.as_millis()
                )))
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        match tokio::time::timeout(self.timeout, self.inner.health_check()).await {
            Ok(result) => result,
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A provider that sleeps before answering.
    struct SlowProvider {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowProvider {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Provider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(ProviderResponse {
                content: "done".into(),
                tool_calls: vec![],
                usage: None,
                model: request.model,
            })
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "test-model".into(),
            messages: vec![ChatMessage::user("Hello")],
            temperature: 0.7,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fast_call_passes_through() {
        let inner = Arc::new(SlowProvider::new(Duration::from_millis(10)));
        let provider = DeadlineProvider::new(inner.clone(), Duration::from_secs(1));

        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.content, "done");
        assert_eq!(provider.name(), "slow");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let inner = Arc::new(SlowProvider::new(Duration::from_secs(30)));
        let provider = DeadlineProvider::new(inner, Duration::from_secs(1));

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(err.to_string().contains("slow"));
    }
}
