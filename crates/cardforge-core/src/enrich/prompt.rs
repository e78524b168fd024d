//! Enrichment prompt construction.
//!
//! One of three German templates is chosen per card: multiple choice with a
//! binary answer key, multiple choice without one, or a free-form card. Each
//! ends in a literal JSON skeleton the model is asked to fill in.

use super::answer_key::{answer_bits, partition_options, resolve_code, OptionPartition};
use super::sanitize::sanitize;
use crate::types::CardInput;
use std::fmt::Write as _;

/// Which template a card gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    MultipleChoiceWithKey,
    MultipleChoice,
    FreeForm,
}

/// Sanitized view of a card, ready for prompting.
#[derive(Debug, Clone)]
pub struct CardContext {
    pub front: String,
    pub back: String,
    /// Sanitized options in original positions (blank entries kept)
    pub options: Vec<String>,
    /// Answer code, only when the card is multiple choice and it has bits
    pub answer_code: Option<String>,
    pub partition: OptionPartition,
}

impl CardContext {
    pub fn from_card(card: &CardInput) -> Self {
        let front = Some(sanitize(&card.front))
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| card.front.trim().to_string());
        let back = sanitize(&card.back);
        let options: Vec<String> = card.options.iter().map(|o| sanitize(o)).collect();
        let answers = card.answers.as_deref().map(sanitize);

        let is_multiple_choice = options.iter().any(|o| !o.is_empty());
        let mut answer_code = None;
        let mut partition = OptionPartition::default();
        if is_multiple_choice {
            if let Some(code) = resolve_code(answers.as_deref(), &back) {
                let bits = answer_bits(code);
                if !bits.is_empty() {
                    partition = partition_options(&options, &bits);
                    answer_code = Some(code.to_string());
                }
            }
        }

        Self {
            front,
            back,
            options,
            answer_code,
            partition,
        }
    }

    pub fn kind(&self) -> PromptKind {
        if !self.options.iter().any(|o| !o.is_empty()) {
            PromptKind::FreeForm
        } else if self.answer_code.is_some() {
            PromptKind::MultipleChoiceWithKey
        } else {
            PromptKind::MultipleChoice
        }
    }
}

/// Build the full enrichment prompt for a card.
pub fn build_prompt(context: &CardContext) -> String {
    let kind = context.kind();
    let mut prompt = String::new();

    prompt.push_str("Du bist ein hilfreicher Tutor für Universitätsprüfungen.\n");
    prompt.push_str(
        "Ergänze die folgende Lernkarte mit einer klaren, strukturierten Erklärung auf Deutsch.\n\n",
    );
    let _ = write!(prompt, "FRAGE: {}", context.front);

    if kind != PromptKind::FreeForm {
        prompt.push_str("\n\nOPTIONEN:\n");
        for (idx, option) in context.options.iter().enumerate() {
            if !option.is_empty() {
                let _ = writeln!(prompt, "{}. {}", idx + 1, option);
            }
        }
    }

    if !context.partition.correct.is_empty() {
        let _ = write!(
            prompt,
            "\n\nRICHTIGE ANTWORTEN (laut Binärcode):\n{}",
            context.partition.correct.join("\n")
        );
    }
    if !context.partition.incorrect.is_empty() {
        let _ = write!(
            prompt,
            "\n\nFALSCHE ANTWORTEN:\n{}",
            context.partition.incorrect.join("\n")
        );
    }

    match (&context.answer_code, context.back.is_empty()) {
        (Some(code), _) => {
            let _ = write!(prompt, "\n\nANTWORT (Binärcode): {code}");
        }
        (None, false) => {
            let _ = write!(prompt, "\n\nANTWORT: {}", context.back);
        }
        (None, true) => {}
    }

    prompt.push_str("\n\n");
    prompt.push_str(instructions(kind));
    prompt.push_str("\n\nAntworte ausschließlich mit gültigem JSON im folgenden Format:\n");
    prompt.push_str(skeleton(kind));
    prompt
}

fn instructions(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::MultipleChoiceWithKey => {
            "WICHTIG - Multiple-Choice mit Binärcode. Antworte sehr kurz, strukturiert und extrem informativ.\n\n\
             1. LÖSUNG: Eine Zeile: \"Die richtige Antwort lautet: [Liste].\" (aus dem Binärcode)\n\n\
             2. ERKLÄRUNG: Max. 3 sehr kurze Zeilen mit Labels:\n   \
             Überblick: ...\n   Richtig: Option X – Grund; Option Y – Grund\n   Falsch: Option Z – Grund\n\n\
             3. BEWERTUNGSTABELLE: Eine Zeile pro Option mit \"aussage\", \"bewertung\" (richtig/falsch) und \"begründung\". Halte dich an den Binärcode.\n\n\
             4. ZUSAMMENFASSUNG: Ein Satz mit der Kernaussage.\n\n\
             5. ESELSBRÜCKE: Falls sinnvoll, maximal ein kurzer Satz. Sonst leer.\n\n\
             6. REFERENZ: Eine passende Quelle, z.B. ein Standardlehrbuch oder eine Leitlinie.\n\n\
             7. EXTRA 1: Optional, maximal ein kurzer Satz (z.B. klinischer Hinweis). Sonst leer."
        }
        PromptKind::MultipleChoice => {
            "WICHTIG - Multiple-Choice. Bestimme die richtigen Optionen selbst. Antworte sehr kurz, strukturiert und extrem informativ.\n\n\
             1. LÖSUNG: Eine Zeile: \"Die richtige Antwort lautet: [Liste].\"\n\n\
             2. ERKLÄRUNG: Max. 3 sehr kurze Zeilen mit Labels:\n   \
             Überblick: ...\n   Richtig: Option X – Grund\n   Falsch: Option Z – Grund\n\n\
             3. BEWERTUNGSTABELLE: Eine Zeile pro Option mit \"aussage\", \"bewertung\" (richtig/falsch) und \"begründung\".\n\n\
             4. ZUSAMMENFASSUNG: Ein Satz mit der Kernaussage.\n\n\
             5. ESELSBRÜCKE: Falls sinnvoll, maximal ein kurzer Satz. Sonst leer.\n\n\
             6. REFERENZ: Eine passende Quelle, z.B. ein Standardlehrbuch oder eine Leitlinie.\n\n\
             7. EXTRA 1: Optional, maximal ein kurzer Satz (z.B. klinischer Hinweis). Sonst leer."
        }
        PromptKind::FreeForm => {
            "WICHTIG - Keine Antwortoptionen. Antworte sehr kurz, strukturiert und extrem informativ.\n\n\
             1. LÖSUNG: Eine Zeile: \"Die richtige Antwort lautet: [Kurzantwort].\"\n\n\
             2. ERKLÄRUNG: Max. 2 sehr kurze Zeilen mit Labels:\n   Überblick: ...\n   Warum korrekt: ...\n\n\
             3. ZUSAMMENFASSUNG: Ein Satz mit der Kernaussage.\n\n\
             4. ESELSBRÜCKE: Falls sinnvoll, maximal ein kurzer Satz. Sonst leer.\n\n\
             5. REFERENZ: Eine passende Quelle, z.B. ein Standardlehrbuch oder eine Leitlinie.\n\n\
             6. EXTRA 1: Optional, maximal ein kurzer Satz (z.B. klinischer Hinweis). Sonst leer."
        }
    }
}

fn skeleton(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::MultipleChoiceWithKey | PromptKind::MultipleChoice => {
            r#"{
  "lösung": "Die richtige Antwort lautet: [Liste der richtigen Optionen].",
  "erklärung": "Überblick: ... | Richtig: ... | Falsch: ...",
  "bewertungstabelle": [
    {"aussage": "1. [Option]", "bewertung": "richtig", "begründung": "..."}
  ],
  "zusammenfassung": "Kernaussage in einem Satz",
  "eselsbrücke": "Eselsbrücke hier oder leer lassen wenn nicht sinnvoll",
  "referenz": "Passende Quelle/Lehrbuch/Leitlinie",
  "extra1": "Zusätzliche Informationen oder leer lassen"
}"#
        }
        PromptKind::FreeForm => {
            r#"{
  "lösung": "Die richtige Antwort lautet: [Kurzantwort].",
  "erklärung": "Überblick: ... | Warum korrekt: ...",
  "zusammenfassung": "Kernaussage in einem Satz",
  "eselsbrücke": "Eselsbrücke hier oder leer lassen wenn nicht sinnvoll",
  "referenz": "Passende Quelle/Lehrbuch/Leitlinie",
  "extra1": "Zusätzliche Informationen oder leer lassen"
}"#
        }
    }
}
