//! LLM integration for flashcard enrichment.
//!
//! Provides a provider abstraction over multiple text generation backends
//! (Gemini, OpenAI, Together AI, generic OpenAI-compatible endpoints), a
//! resolver that builds the provider chain from overrides and the environment,
//! and a fallback chain that retries transient failures and moves across
//! providers.

pub(crate) mod fallback;
pub(crate) mod gemini;
pub(crate) mod openai;
pub(crate) mod provider;
pub mod resolve;
pub(crate) mod retry;

#[cfg(test)]
pub(crate) mod mock;

pub use fallback::FallbackChain;
pub use provider::{
    LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse, ProviderConfig, ProviderKind,
};
pub use resolve::{resolve_providers, LlmOverrides, ResolvedLlm};
pub use retry::{backoff_duration, is_retryable, RetryPolicy};
