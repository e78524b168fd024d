//! Batch progress persistence.
//!
//! A [`Checkpoint`] stores one [`BatchProgress`] per key so an interrupted
//! batch can resume without re-requesting cards it already enriched.

use crate::error::CheckpointError;
use crate::types::{CardInput, EnrichedCard};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Checkpoint key for a deck: `deck_` followed by the name with every
/// non-alphanumeric character replaced by `_`.
pub fn checkpoint_key(deck: &str) -> String {
    let sanitized: String = deck
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("deck_{sanitized}")
}

/// A failure recorded against a batch position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressError {
    pub offset: usize,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Incremental state of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    /// Cards completed so far; always equals `enriched.len()`
    pub processed: usize,
    pub total: usize,
    pub enriched: Vec<EnrichedCard>,
    #[serde(default)]
    pub errors: Vec<ProgressError>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        let now = Utc::now();
        Self {
            processed: 0,
            total,
            enriched: Vec::new(),
            errors: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Whether this progress can continue a batch over `cards`.
    ///
    /// The saved prefix must belong to the same cards, matched by id and
    /// front text, in the same positions.
    pub fn is_resumable_for(&self, cards: &[CardInput]) -> bool {
        self.total == cards.len()
            && self.processed == self.enriched.len()
            && self.processed <= cards.len()
            && self
                .enriched
                .iter()
                .zip(cards)
                .all(|(done, card)| done.id == card.id && done.front == card.front)
    }

    pub(crate) fn record(&mut self, card: EnrichedCard) {
        self.enriched.push(card);
        self.processed = self.enriched.len();
        self.updated_at = Utc::now();
    }

    pub(crate) fn record_error(&mut self, offset: usize, message: String) {
        let now = Utc::now();
        self.errors.push(ProgressError {
            offset,
            message,
            timestamp: now,
        });
        self.updated_at = now;
    }
}

/// Storage for batch progress, keyed by [`checkpoint_key`].
pub trait Checkpoint: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<BatchProgress>, CheckpointError>;
    fn save(&self, key: &str, progress: &BatchProgress) -> Result<(), CheckpointError>;
    fn clear(&self, key: &str) -> Result<(), CheckpointError>;
}

/// JSON file holding progress for every key.
///
/// Writes go to a sibling temp file that is then renamed over the original.
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, BatchProgress>, CheckpointError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| CheckpointError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, all: &BTreeMap<String, BatchProgress>) -> Result<(), CheckpointError> {
        let io_err = |source| CheckpointError::Io {
            path: self.path.clone(),
            source,
        };
        if all.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_err(e)),
                _ => Ok(()),
            };
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(all).map_err(|source| CheckpointError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl Checkpoint for FileCheckpoint {
    fn load(&self, key: &str) -> Result<Option<BatchProgress>, CheckpointError> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, progress: &BatchProgress) -> Result<(), CheckpointError> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), progress.clone());
        self.write_all(&all)
    }

    fn clear(&self, key: &str) -> Result<(), CheckpointError> {
        let mut all = self.read_all()?;
        if all.remove(key).is_some() {
            self.write_all(&all)?;
        }
        Ok(())
    }
}

/// In-process checkpoint, for embedding and tests.
#[derive(Default)]
pub struct MemoryCheckpoint {
    entries: Mutex<HashMap<String, BatchProgress>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, BatchProgress>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Checkpoint for MemoryCheckpoint {
    fn load(&self, key: &str) -> Result<Option<BatchProgress>, CheckpointError> {
        Ok(self.entries().get(key).cloned())
    }

    fn save(&self, key: &str, progress: &BatchProgress) -> Result<(), CheckpointError> {
        self.entries().insert(key.to_string(), progress.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), CheckpointError> {
        self.entries().remove(key);
        Ok(())
    }
}
