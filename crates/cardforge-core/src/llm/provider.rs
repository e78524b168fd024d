//! LLM provider trait, provider kinds, and request/response types.
//!
//! Defines the interface that all text generation backends implement, plus the
//! factory that turns a resolved [`ProviderConfig`] into a provider. Vendor
//! identity is consulted here and in the resolver only; everything downstream
//! talks to `dyn LlmProvider`.

use super::gemini::GeminiProvider;
use super::openai::OpenAiProvider;
use crate::error::{ConfigError, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Supported provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Google Gemini (native generateContent API)
    #[serde(rename = "gemini")]
    Gemini,
    /// OpenAI Chat Completions
    #[serde(rename = "openai")]
    OpenAi,
    /// Together AI (OpenAI-compatible)
    #[serde(rename = "together")]
    Together,
    /// Any OpenAI-compatible endpoint; requires an explicit base URL
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
}

impl ProviderKind {
    /// Parse a provider name, accepting the common aliases.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "together" | "togetherai" | "together-ai" => Ok(Self::Together),
            "openai-compatible" | "openai_compatible" => Ok(Self::OpenAiCompatible),
            _ => Err(ConfigError::UnknownProvider(value.to_string())),
        }
    }

    /// Parse a comma-separated list, skipping blank entries.
    pub fn parse_list(value: &str) -> Result<Vec<Self>, ConfigError> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Together => "together",
            Self::OpenAiCompatible => "openai-compatible",
        }
    }

    /// Provider-specific API key variable.
    pub(crate) fn key_var(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi | Self::OpenAiCompatible => "OPENAI_API_KEY",
            Self::Together => "TOGETHER_API_KEY",
        }
    }

    /// Provider-specific model variable.
    pub(crate) fn model_var(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_MODEL"),
            Self::OpenAi => Some("OPENAI_MODEL"),
            Self::Together => Some("TOGETHER_MODEL"),
            Self::OpenAiCompatible => None,
        }
    }

    /// Provider-specific base URL variable.
    pub(crate) fn base_url_var(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_BASE_URL"),
            Self::OpenAi => Some("OPENAI_BASE_URL"),
            Self::Together => Some("TOGETHER_BASE_URL"),
            Self::OpenAiCompatible => None,
        }
    }

    /// Whether `LLM_BASE_URL` applies to this kind.
    ///
    /// Gemini speaks a different wire format, so a generic chat-completions
    /// endpoint must never be routed to it.
    pub(crate) fn accepts_generic_base_url(&self) -> bool {
        !matches!(self, Self::Gemini)
    }

    pub(crate) fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAi => "gpt-4o-mini",
            Self::Together => "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo",
            Self::OpenAiCompatible => "gpt-4o-mini",
        }
    }

    pub(crate) fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("https://generativelanguage.googleapis.com"),
            Self::OpenAi => Some("https://api.openai.com"),
            Self::Together => Some("https://api.together.xyz"),
            Self::OpenAiCompatible => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved provider: credential, model, endpoint.
///
/// Immutable once built by the resolver.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// A one-shot text generation request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Full prompt text
    pub prompt: String,
    /// Network-level timeout for this attempt
    pub timeout: Duration,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            timeout,
        }
    }
}

/// The response from a generation call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Raw generated text (untrusted)
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Arc<dyn LlmProvider>` for dynamic dispatch).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and aggregate errors (e.g., "gemini").
    fn name(&self) -> &str;

    /// Generate text for the given prompt.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}

/// Factory that creates the appropriate provider from a resolved config.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create a provider for `config`.
    ///
    /// This is the single place where provider kinds are dispatched.
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        match config.kind {
            ProviderKind::Gemini => {
                let base_url = config
                    .base_url
                    .as_deref()
                    .or(config.kind.default_base_url())
                    .unwrap_or_default();
                Ok(Arc::new(GeminiProvider::new(
                    base_url,
                    &config.api_key,
                    &config.model,
                )))
            }
            kind => {
                let base_url = config.base_url.as_deref().ok_or_else(|| {
                    ConfigError::MissingBaseUrl {
                        provider: kind.to_string(),
                    }
                })?;
                Ok(Arc::new(OpenAiProvider::new(
                    kind.as_str(),
                    base_url,
                    &config.api_key,
                    &config.model,
                )))
            }
        }
    }
}

/// Map a non-2xx HTTP status onto the error taxonomy.
pub(crate) fn classify_status(
    provider: &str,
    status: u16,
    message: String,
    timeout: Duration,
) -> LlmError {
    let provider = provider.to_string();
    match status {
        401 | 403 => LlmError::Auth {
            provider,
            status,
            message,
        },
        429 => LlmError::RateLimit { provider, message },
        408 => LlmError::Timeout {
            provider,
            timeout_ms: timeout.as_millis() as u64,
        },
        500..=599 => LlmError::Server {
            provider,
            status,
            message,
        },
        _ => LlmError::BadRequest {
            provider,
            status,
            message,
        },
    }
}

/// Map a transport failure (no HTTP status) onto the error taxonomy.
pub(crate) fn classify_transport(provider: &str, err: &reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout {
            provider: provider.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        LlmError::Network {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ".."}`; anything else is returned as (truncated) raw text.
pub(crate) fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error"),
            value.get("message"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(s) = candidate.as_str().filter(|s| !s.trim().is_empty()) {
                return s.trim().to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return reason.unwrap_or("Request failed").to_string();
    }
    trimmed.chars().take(300).collect()
}
