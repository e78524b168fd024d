//! Core data types for the Cardforge enrichment pipeline.
//!
//! These types represent a card going into enrichment and the canonical
//! enriched record coming out of it.

use serde::{Deserialize, Serialize};

/// A flashcard to be enriched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardInput {
    /// Question text (may contain HTML)
    pub front: String,

    /// Original answer text or binary answer code
    #[serde(default)]
    pub back: String,

    /// Multiple-choice options in display order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    /// Explicit binary answer code, e.g. "1 0 1"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<String>,

    /// Source note identifier, when the card came from a store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// How an enriched card came to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The model produced a usable answer
    #[default]
    Enriched,
    /// Generation or parsing failed; fields carry a diagnostic
    Failed,
    /// Every provider was out of quota
    RateLimited,
    /// Not attempted because an earlier card hit the rate limit
    Skipped,
}

/// Verdict for one statement of a multiple-choice card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Incorrect,
}

impl Verdict {
    /// Interpret a model-supplied verdict (German or English, word or bool).
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(true) => Some(Self::Correct),
            serde_json::Value::Bool(false) => Some(Self::Incorrect),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(1) => Some(Self::Correct),
                Some(0) => Some(Self::Incorrect),
                _ => None,
            },
            serde_json::Value::String(s) => Self::from_word(s),
            _ => None,
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        let word = word.trim().to_lowercase();
        const INCORRECT: &[&str] = &[
            "falsch", "inkorrekt", "incorrect", "wrong", "false", "nein", "no", "0", "✗", "✘",
        ];
        const CORRECT: &[&str] = &[
            "richtig", "korrekt", "correct", "wahr", "true", "ja", "yes", "1", "✓", "✔",
        ];
        if INCORRECT.iter().any(|w| word.starts_with(w)) {
            Some(Self::Incorrect)
        } else if CORRECT.iter().any(|w| word.starts_with(w)) {
            Some(Self::Correct)
        } else {
            None
        }
    }

    /// German label used when rendering into notes.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Correct => "richtig",
            Self::Incorrect => "falsch",
        }
    }
}

/// One row of the structured grading table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRow {
    #[serde(rename = "aussage")]
    pub statement: String,

    #[serde(rename = "bewertung")]
    pub verdict: Verdict,

    #[serde(rename = "begründung", default)]
    pub justification: String,
}

/// Canonical enrichment fields recovered from a model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentFields {
    pub solution: String,
    pub explanation: String,
    pub grading_table: Vec<GradingRow>,
    pub summary: String,
    pub mnemonic: String,
    pub reference: String,
    pub extra: String,
}

/// The canonical enriched card.
///
/// Serialized with the German keys the downstream note type expects.
/// `front` and `back` are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedCard {
    pub front: String,

    #[serde(default)]
    pub back: String,

    #[serde(rename = "lösung", default)]
    pub solution: String,

    #[serde(rename = "erklärung", default)]
    pub explanation: String,

    #[serde(
        rename = "bewertungstabelle",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub grading_table: Vec<GradingRow>,

    #[serde(
        rename = "zusammenfassung",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub summary: String,

    #[serde(rename = "eselsbrücke", default)]
    pub mnemonic: String,

    #[serde(rename = "referenz", default)]
    pub reference: String,

    #[serde(rename = "extra1", default)]
    pub extra: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    #[serde(rename = "answers", default, skip_serializing_if = "Option::is_none")]
    pub answer_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub outcome: Outcome,
}

impl EnrichedCard {
    /// A successfully enriched card carrying the original inputs verbatim.
    pub fn enriched(card: &CardInput, fields: EnrichmentFields) -> Self {
        Self {
            solution: fields.solution,
            explanation: fields.explanation,
            grading_table: fields.grading_table,
            summary: fields.summary,
            mnemonic: fields.mnemonic,
            reference: fields.reference,
            extra: fields.extra,
            ..Self::passthrough(card, Outcome::Enriched)
        }
    }

    /// A degraded card: the original answer stands in as the solution and
    /// the explanation carries `diagnostic`.
    pub fn degraded(card: &CardInput, diagnostic: String, outcome: Outcome) -> Self {
        Self {
            explanation: diagnostic,
            ..Self::passthrough(card, outcome)
        }
    }

    /// Placeholder for a card that was never sent to a provider.
    pub fn skipped(card: &CardInput) -> Self {
        Self::degraded(
            card,
            "Skipped: the rate limit was reached earlier in this batch. \
             Try again later or switch provider."
                .to_string(),
            Outcome::Skipped,
        )
    }

    fn passthrough(card: &CardInput, outcome: Outcome) -> Self {
        Self {
            front: card.front.clone(),
            back: card.back.clone(),
            solution: card.back.clone(),
            explanation: String::new(),
            grading_table: Vec::new(),
            summary: String::new(),
            mnemonic: String::new(),
            reference: String::new(),
            extra: String::new(),
            options: (!card.options.is_empty()).then(|| card.options.clone()),
            answer_code: card.answers.clone(),
            id: card.id.clone(),
            outcome,
        }
    }

    /// Whether the card is usable enrichment (as opposed to a diagnostic).
    pub fn is_enriched(&self) -> bool {
        self.outcome == Outcome::Enriched
    }
}
