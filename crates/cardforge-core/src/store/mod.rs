//! Flashcard store collaborator.
//!
//! Notes are read from and written back to Anki through the AnkiConnect
//! add-on. The pipeline only depends on the [`NoteStore`] trait.

pub mod anki;
pub mod fields;
pub mod render;

pub use anki::AnkiConnect;
pub use fields::{deck_cards, is_already_enriched, sanitize_deck_name, DeckCard};
pub use render::{render_in_place, render_note, ENRICHED_FIELDS};

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One field of an existing note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteField {
    pub value: String,
    #[serde(default)]
    pub order: u32,
}

/// An existing note as reported by `notesInfo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub note_id: u64,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, NoteField>,
}

impl NoteInfo {
    /// Value of a field, if the note type has it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|f| f.value.as_str())
    }
}

/// A note to be created in the enriched note type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewNote {
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

/// Access to a flashcard collection.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn list_decks(&self) -> Result<Vec<String>, StoreError>;

    /// Note ids matching a store search query, e.g. `deck:"Kardiologie"`.
    async fn find_notes(&self, query: &str) -> Result<Vec<u64>, StoreError>;

    async fn notes_info(&self, ids: &[u64]) -> Result<Vec<NoteInfo>, StoreError>;

    /// Create notes in `deck`. Returns one id per note; `None` where the
    /// store rejected the note (for example a duplicate).
    async fn add_notes(&self, deck: &str, notes: &[NewNote]) -> Result<Vec<Option<u64>>, StoreError>;

    async fn update_note_fields(
        &self,
        id: u64,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), StoreError>;
}
