//! Error types for the Cardforge enrichment pipeline.
//!
//! Errors are organized by concern. Only [`ConfigError`] is meant to escape the
//! pipeline as a hard failure; [`LlmError`] and [`ParseError`] are absorbed at
//! the card level and turned into annotated output.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Cardforge operations.
#[derive(Error, Debug)]
pub enum CardforgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Text generation errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Model output could not be parsed
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Flashcard store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Progress checkpoint errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
///
/// These are startup-time faults: nothing can be enriched until they are fixed.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Provider name not recognized
    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),

    /// No credential could be resolved for the primary provider
    #[error("No LLM API key configured for {provider}. Set {hint}.")]
    MissingCredential { provider: String, hint: String },

    /// The generic OpenAI-compatible provider has no endpoint
    #[error("LLM_BASE_URL (or a base URL override) is required for provider \"{provider}\"")]
    MissingBaseUrl { provider: String },
}

/// A single provider's final failure inside an exhausted fallback chain.
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: LlmError,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no providers configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Text generation errors, classified precisely enough to drive retry and
/// fallback decisions.
#[derive(Error, Debug)]
pub enum LlmError {
    /// 401/403: bad or missing credential
    #[error("authentication failed (HTTP {status}): {message}")]
    Auth {
        provider: String,
        status: u16,
        message: String,
    },

    /// 429: quota or rate limit
    #[error("rate limit exceeded (HTTP 429): {message}")]
    RateLimit { provider: String, message: String },

    /// 5xx
    #[error("server error (HTTP {status}): {message}")]
    Server {
        provider: String,
        status: u16,
        message: String,
    },

    /// Attempt exceeded its time budget
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    /// 2xx without any extractable text
    #[error("empty response from provider")]
    EmptyResponse { provider: String },

    /// Transport-level failure (connection refused, DNS, reset)
    #[error("request failed: {message}")]
    Network { provider: String, message: String },

    /// Any other non-2xx status
    #[error("request rejected (HTTP {status}): {message}")]
    BadRequest {
        provider: String,
        status: u16,
        message: String,
    },

    /// Every provider in the chain failed
    #[error("All providers failed. {}", join_failures(.failures))]
    Exhausted { failures: Vec<ProviderFailure> },
}

impl LlmError {
    /// Whether this error (or, for an exhausted chain, any provider's final
    /// error) was a quota/rate-limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            LlmError::RateLimit { .. } => true,
            LlmError::Exhausted { failures } => failures.iter().any(|f| f.error.is_rate_limited()),
            _ => false,
        }
    }
}

/// Model output that is not valid JSON even after the repair pass.
#[derive(Error, Debug, Clone)]
#[error("Failed to parse JSON response: {message} (response starts with: {excerpt:?})")]
pub struct ParseError {
    pub message: String,
    /// First ~500 characters of the raw text, for diagnosis
    pub excerpt: String,
}

/// Flashcard store (AnkiConnect) errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store URL does not point at the local machine
    #[error("AnkiConnect is only available on localhost (got {0})")]
    NotLocal(String),

    /// Could not reach AnkiConnect at all
    #[error(
        "Cannot connect to Anki Desktop at {url}. Make sure Anki is running \
         and the AnkiConnect add-on is installed and enabled."
    )]
    Unreachable { url: String },

    /// Non-2xx HTTP status
    #[error("AnkiConnect HTTP {status}")]
    Http { status: u16 },

    /// AnkiConnect returned an `error` field
    #[error("AnkiConnect error: {0}")]
    Api(String),

    /// Response body did not have the expected shape
    #[error("Unexpected AnkiConnect response: {0}")]
    Decode(String),
}

/// Progress checkpoint errors.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to access checkpoint file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt checkpoint file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Cardforge results.
pub type Result<T> = std::result::Result<T, CardforgeError>;

/// Convenience type alias for LLM-specific results.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_joins_provider_failures() {
        let err = LlmError::Exhausted {
            failures: vec![
                ProviderFailure {
                    provider: "gemini".to_string(),
                    error: LlmError::RateLimit {
                        provider: "gemini".to_string(),
                        message: "quota".to_string(),
                    },
                },
                ProviderFailure {
                    provider: "openai".to_string(),
                    error: LlmError::EmptyResponse {
                        provider: "openai".to_string(),
                    },
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "All providers failed. gemini: rate limit exceeded (HTTP 429): quota | \
             openai: empty response from provider"
        );
    }

    #[test]
    fn exhausted_is_rate_limited_if_any_provider_was() {
        let err = LlmError::Exhausted {
            failures: vec![
                ProviderFailure {
                    provider: "openai".to_string(),
                    error: LlmError::Auth {
                        provider: "openai".to_string(),
                        status: 401,
                        message: "bad key".to_string(),
                    },
                },
                ProviderFailure {
                    provider: "together".to_string(),
                    error: LlmError::RateLimit {
                        provider: "together".to_string(),
                        message: String::new(),
                    },
                },
            ],
        };
        assert!(err.is_rate_limited());
    }

    #[test]
    fn empty_exhausted_chain_has_readable_message() {
        let err = LlmError::Exhausted { failures: vec![] };
        assert!(err.to_string().contains("no providers configured"));
        assert!(!err.is_rate_limited());
    }
}
