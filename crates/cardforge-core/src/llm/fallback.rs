//! Retry and fallback across an ordered chain of providers.
//!
//! Each call walks an explicit state machine: a provider is tried, transient
//! failures are retried on the same provider with exponential backoff, and
//! anything else (or an exhausted retry budget) moves on to the next provider.
//! The first success short-circuits the chain.

use super::provider::{LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse};
use super::resolve::ResolvedLlm;
use super::retry::{self, RetryPolicy};
use crate::error::{ConfigError, LlmError, ProviderFailure};
use std::sync::Arc;
use std::time::Duration;

/// Ordered providers sharing one retry policy and per-attempt timeout.
pub struct FallbackChain {
    providers: Vec<Arc<dyn LlmProvider>>,
    policy: RetryPolicy,
    timeout: Duration,
}

enum State {
    Trying { provider: usize, attempt: u32 },
    RetryWait { provider: usize, attempt: u32, error: LlmError },
    NextProvider { provider: usize, error: LlmError },
    Success(LlmResponse),
    Exhausted,
}

impl FallbackChain {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            providers,
            policy,
            timeout,
        }
    }

    /// Build the chain from a resolved configuration.
    pub fn from_resolved(resolved: &ResolvedLlm) -> Result<Self, ConfigError> {
        let providers = resolved
            .providers
            .iter()
            .map(LlmProviderFactory::create)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(providers, resolved.retry, resolved.timeout))
    }

    /// Provider names in the order they are tried.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Generate text, retrying and falling back as needed.
    ///
    /// Returns [`LlmError::Exhausted`] carrying every provider's final error
    /// when nothing succeeded.
    pub async fn generate(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        let request = LlmRequest::new(prompt, self.timeout);
        let mut failures: Vec<ProviderFailure> = Vec::new();
        let mut state = if self.providers.is_empty() {
            State::Exhausted
        } else {
            State::Trying {
                provider: 0,
                attempt: 0,
            }
        };

        loop {
            state = match state {
                State::Trying { provider, attempt } => {
                    match self.attempt(&self.providers[provider], &request).await {
                        Ok(response) => State::Success(response),
                        Err(error)
                            if retry::is_retryable(&error) && attempt < self.policy.max_retries =>
                        {
                            State::RetryWait {
                                provider,
                                attempt,
                                error,
                            }
                        }
                        Err(error) => State::NextProvider { provider, error },
                    }
                }
                State::RetryWait {
                    provider,
                    attempt,
                    error,
                } => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::debug!(
                        "Retry {}/{} for {} after {delay:?}: {error}",
                        attempt + 1,
                        self.policy.max_retries,
                        self.providers[provider].name()
                    );
                    tokio::time::sleep(delay).await;
                    State::Trying {
                        provider,
                        attempt: attempt + 1,
                    }
                }
                State::NextProvider { provider, error } => {
                    let name = self.providers[provider].name().to_string();
                    let next = provider + 1;
                    if next < self.providers.len() {
                        tracing::warn!(
                            "Provider {name} failed ({error}), falling back to {}",
                            self.providers[next].name()
                        );
                    } else {
                        tracing::warn!("Provider {name} failed ({error}), no fallback left");
                    }
                    failures.push(ProviderFailure {
                        provider: name,
                        error,
                    });
                    if next < self.providers.len() {
                        State::Trying {
                            provider: next,
                            attempt: 0,
                        }
                    } else {
                        State::Exhausted
                    }
                }
                State::Success(response) => return Ok(response),
                State::Exhausted => return Err(LlmError::Exhausted { failures }),
            };
        }
    }

    /// One call bounded by the per-attempt timeout.
    async fn attempt(
        &self,
        provider: &Arc<dyn LlmProvider>,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        match tokio::time::timeout(self.timeout, provider.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                provider: provider.name().to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
