//! Cardforge Core - flashcard enrichment library.
//!
//! Cardforge takes flashcards (question/answer pairs, possibly multiple
//! choice) and enriches them with model-generated solutions, explanations,
//! grading tables and mnemonics, then writes the results back to Anki.
//!
//! # Architecture
//!
//! ```text
//! Card → Sanitize → Prompt → Fallback chain (retry, backoff) → Tolerant JSON → EnrichedCard
//! ```
//!
//! Provider failures never abort a batch: each card degrades to an annotated
//! result, and a batch stops early once every provider is out of quota so the
//! remaining range can be retried later.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cardforge_core::{BatchEnricher, CardInput, Config, Environment, FallbackChain, LlmOverrides};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cardforge_core::Result<()> {
//!     let config = Config::load()?;
//!     let env = Environment::from_process();
//!     let resolved = cardforge_core::resolve_providers(&LlmOverrides::default(), &env, &config.llm)?;
//!     let chain = Arc::new(FallbackChain::from_resolved(&resolved)?);
//!
//!     let batch = BatchEnricher::new(chain, config.request_delay(&env));
//!     let cards = vec![CardInput { front: "Fever causes?".into(), back: "Infection".into(), ..Default::default() }];
//!     let outcome = batch.enrich_many(&cards, |done, total| println!("{done}/{total}")).await;
//!     println!("{}", serde_json::to_string_pretty(&outcome.cards)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod enrich;
pub mod error;
pub mod llm;
pub mod normalize;
pub mod priorities;
pub mod store;
pub mod types;

pub use config::{Config, Environment};
pub use enrich::{
    checkpoint_key, BatchEnricher, BatchOutcome, BatchProgress, CardEnricher, Checkpoint,
    ChunkRequest, ChunkResponse, FileCheckpoint, MemoryCheckpoint, RATE_LIMIT_MARKER,
};
pub use error::{
    CardforgeError, CheckpointError, ConfigError, LlmError, LlmResult, ParseError, Result,
    StoreError,
};
pub use llm::{resolve_providers, FallbackChain, LlmOverrides, ProviderKind, ResolvedLlm};
pub use priorities::{
    frequency_priorities, suggest_top_priorities, PriorityCard, PriorityMethod, PriorityReport,
    PrioritySuggestion,
};
pub use store::{AnkiConnect, NoteStore};
pub use types::{CardInput, EnrichedCard, GradingRow, Outcome, Verdict};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
