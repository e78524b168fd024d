//! Scriptable in-process provider for tests.

use super::fallback::FallbackChain;
use super::provider::{LlmProvider, LlmRequest, LlmResponse};
use super::retry::RetryPolicy;
use crate::error::LlmError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ResponseFn = Box<dyn Fn(u32) -> Result<String, LlmError> + Send + Sync>;

/// A configurable mock LLM provider.
///
/// Each call to `generate()` invokes the response factory with the current
/// call index, allowing callers to return different results per attempt.
pub(crate) struct MockProvider {
    name: String,
    response_fn: ResponseFn,
    call_count: Arc<AtomicU32>,
    prompts: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub(crate) fn new<F>(name: &str, response_fn: F) -> Self
    where
        F: Fn(u32) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            response_fn: Box::new(response_fn),
            call_count: Arc::new(AtomicU32::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub(crate) fn success(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, move |_| Ok(text.clone()))
    }

    /// Always fails with the error built by `make` (given the provider name).
    pub(crate) fn failing(name: &str, make: fn(&str) -> LlmError) -> Self {
        let owned = name.to_string();
        Self::new(name, move |_| Err(make(&owned)))
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared handle to the call counter (clone before moving the provider).
    pub(crate) fn call_count_handle(&self) -> Arc<AtomicU32> {
        self.call_count.clone()
    }

    /// Shared handle to every prompt received.
    pub(crate) fn prompts_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.response_fn)(idx).map(|text| LlmResponse {
            text,
            model: "mock-v1".to_string(),
            latency_ms: 1,
        })
    }
}

pub(crate) fn rate_limit(provider: &str) -> LlmError {
    LlmError::RateLimit {
        provider: provider.to_string(),
        message: "quota exceeded".to_string(),
    }
}

pub(crate) fn auth_error(provider: &str) -> LlmError {
    LlmError::Auth {
        provider: provider.to_string(),
        status: 401,
        message: "invalid api key".to_string(),
    }
}

pub(crate) fn server_error(provider: &str) -> LlmError {
    LlmError::Server {
        provider: provider.to_string(),
        status: 503,
        message: "overloaded".to_string(),
    }
}

/// Chain with a 1ms backoff base and a generous timeout.
pub(crate) fn chain(providers: Vec<MockProvider>, max_retries: u32) -> FallbackChain {
    FallbackChain::new(
        providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
            .collect(),
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        },
        Duration::from_secs(5),
    )
}
