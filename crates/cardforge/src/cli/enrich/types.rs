//! CLI enum types for the enrich command.

use clap::ValueEnum;

/// Where enriched cards are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SyncMode {
    /// Create new notes of the enriched note type (default)
    #[default]
    NewNotes,
    /// Write the enrichment into the source note's "Extra 1" field
    InPlace,
    /// Do not write to Anki
    None,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::NewNotes => write!(f, "new-notes"),
            SyncMode::InPlace => write!(f, "in-place"),
            SyncMode::None => write!(f, "none"),
        }
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub enriched: usize,
    pub failed: usize,
    pub skipped: usize,
    pub synced: usize,
    /// Deck position of the first card that was not completed
    pub resume_offset: Option<usize>,
    /// Deck positions of cards whose generation failed; they were not synced
    pub failed_positions: Vec<usize>,
}
