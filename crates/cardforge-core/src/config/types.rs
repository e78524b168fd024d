//! Sub-configuration structs with defaults.

use serde::{Deserialize, Serialize};

/// LLM provider selection and call policy.
///
/// Credentials are never stored here; they come from the environment or
/// per-run overrides (see [`crate::llm::resolve`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Primary provider ("gemini", "openai", "together", "openai-compatible")
    pub provider: String,

    /// Fallback providers, tried in order after the primary
    pub fallback_providers: Vec<String>,

    /// Max retry attempts per provider for transient failures
    pub max_retries: u32,

    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Base backoff delay in milliseconds (doubled per attempt)
    pub retry_delay_ms: u64,

    /// Pause between cards in a batch, in milliseconds
    pub request_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            fallback_providers: Vec::new(),
            max_retries: 3,
            timeout_ms: 120_000,
            retry_delay_ms: 2_000,
            request_delay_ms: 500,
        }
    }
}

/// Flashcard store (AnkiConnect) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// AnkiConnect endpoint; only localhost is accepted
    pub url: String,

    /// Note type created for enriched cards
    pub note_type: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8765".to_string(),
            note_type: "Enriched Card".to_string(),
        }
    }
}

/// Batch enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Cards enriched per chunk before syncing and checkpointing
    pub batch_size: usize,

    /// Maximum cards taken from a deck per run
    pub limit: usize,

    /// Progress file used to resume interrupted runs
    pub checkpoint_file: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            limit: 100,
            checkpoint_file: "~/.cardforge/progress.json".to_string(),
        }
    }
}

/// Priority/topic summarizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrioritiesConfig {
    /// Number of topics requested
    pub top_n: usize,

    /// Maximum cards taken from a deck
    pub limit: usize,
}

impl Default for PrioritiesConfig {
    fn default() -> Self {
        Self {
            top_n: 15,
            limit: 300,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
