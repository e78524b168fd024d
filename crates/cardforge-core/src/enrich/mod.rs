//! Flashcard enrichment: prompt building, single-card enrichment, and
//! checkpointed sequential batches.

pub mod answer_key;
pub(crate) mod batch;
pub(crate) mod card;
pub(crate) mod checkpoint;
pub(crate) mod prompt;
pub mod sanitize;

pub use batch::{BatchEnricher, BatchOutcome, ChunkRequest, ChunkResponse};
pub use card::{CardEnricher, RATE_LIMIT_MARKER};
pub use checkpoint::{
    checkpoint_key, BatchProgress, Checkpoint, FileCheckpoint, MemoryCheckpoint, ProgressError,
};
pub use prompt::{build_prompt, CardContext, PromptKind};
