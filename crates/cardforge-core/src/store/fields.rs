//! Mapping between store notes and pipeline cards.
//!
//! Source decks use a variety of note types, so fields are located by
//! conventional names rather than by position.

use super::{NoteInfo, NoteStore};
use crate::enrich::sanitize::collapse_whitespace;
use crate::error::StoreError;
use crate::priorities::PriorityCard;
use crate::types::CardInput;
use serde::{Deserialize, Serialize};

const FRONT_FIELDS: &[&str] = &["Question", "Frage", "Front", "Text", "Cloze"];
const ANSWER_FIELDS: &[&str] = &["Answers", "Antwort", "Back"];
const MAX_OPTIONS: usize = 5;

/// Fields that hold a previous in-place enrichment, checked in order.
const ENRICHMENT_FIELDS: &[&str] = &["Extra 1", "Sources"];
const ENRICHMENT_MARKERS: &[&str] = &["Lösung:", "Erklärung:", "Bewertungstabelle", "Zusammenfassung:"];

/// A card read from a deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCard {
    pub note_id: u64,
    /// Index of the note in the unfiltered deck listing
    pub position: usize,
    pub front: String,
    /// Answer text or binary answer code, whichever the note type stores
    pub back: String,
    pub options: Vec<String>,
    pub tags: Vec<String>,
    pub note_type: String,
}

impl DeckCard {
    pub fn from_note(note: &NoteInfo, position: usize) -> Self {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| note.field(name))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .unwrap_or_default()
                .to_string()
        };

        let options = (1..=MAX_OPTIONS)
            .filter_map(|i| note.field(&format!("Q_{i}")))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect();

        Self {
            note_id: note.note_id,
            position,
            front: first(FRONT_FIELDS),
            back: first(ANSWER_FIELDS),
            options,
            tags: note.tags.clone(),
            note_type: if note.model_name.is_empty() {
                "Unknown".to_string()
            } else {
                note.model_name.clone()
            },
        }
    }

    pub fn to_card_input(&self) -> CardInput {
        CardInput {
            front: self.front.clone(),
            back: self.back.clone(),
            options: self.options.clone(),
            answers: Some(self.back.clone()).filter(|a| !a.is_empty()),
            id: Some(self.note_id.to_string()),
            tags: self.tags.clone(),
        }
    }

    pub fn to_priority_card(&self) -> PriorityCard {
        PriorityCard {
            id: self.note_id.to_string(),
            front: self.front.clone(),
            options: self.options.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Strip characters that would break a quoted store query.
pub fn sanitize_deck_name(deck: &str) -> String {
    let cleaned: String = deck
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\''))
        .collect();
    collapse_whitespace(&cleaned)
}

/// Whether a note already carries an in-place enrichment.
///
/// Looks at the first non-empty of `Extra 1` and `Sources`.
pub fn is_already_enriched(note: &NoteInfo) -> bool {
    ENRICHMENT_FIELDS
        .iter()
        .filter_map(|name| note.field(name))
        .find(|v| !v.trim().is_empty())
        .is_some_and(|content| ENRICHMENT_MARKERS.iter().any(|m| content.contains(m)))
}

/// Read every note of `deck`, in store order.
///
/// With `skip_enriched`, notes that already carry an in-place enrichment
/// are left out. Positions always count every note of the deck, so they
/// stay stable across runs that filter differently.
pub async fn deck_cards(
    store: &dyn NoteStore,
    deck: &str,
    skip_enriched: bool,
) -> Result<Vec<DeckCard>, StoreError> {
    let deck = sanitize_deck_name(deck);
    let ids = store.find_notes(&format!("deck:\"{deck}\"")).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let notes = store.notes_info(&ids).await?;
    let total = notes.len();
    let cards: Vec<DeckCard> = notes
        .iter()
        .enumerate()
        .filter(|(_, note)| !(skip_enriched && is_already_enriched(note)))
        .map(|(position, note)| DeckCard::from_note(note, position))
        .collect();

    if cards.len() < total {
        tracing::info!(
            "Skipping {} already enriched notes in {deck}",
            total - cards.len()
        );
    }
    Ok(cards)
}
