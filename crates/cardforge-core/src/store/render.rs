//! Rendering enriched cards into note fields.
//!
//! Model output is plain text and gets HTML-escaped; original card content
//! is already store HTML and is passed through unchanged.

use crate::types::{EnrichedCard, GradingRow};
use std::collections::BTreeMap;

/// Fields of the enriched note type, in display order.
pub const ENRICHED_FIELDS: &[&str] = &[
    "Front",
    "Back",
    "Original-Antwort",
    "Optionen",
    "Lösung",
    "Erklärung",
    "Eselsbrücke",
    "Referenz",
    "Extra 1",
];

/// Field that receives in-place enrichment on source notes.
pub const IN_PLACE_FIELD: &str = "Extra 1";

/// Render a card into the fields of the enriched note type.
///
/// The grading table and summary have no dedicated field and are appended
/// to `Extra 1`.
pub fn render_note(card: &EnrichedCard) -> BTreeMap<String, String> {
    let original_answer = card
        .answer_code
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(card.back.as_str());
    let options = card
        .options
        .as_deref()
        .map(|opts| {
            opts.iter()
                .enumerate()
                .map(|(i, opt)| format!("{}. {opt}", i + 1))
                .collect::<Vec<_>>()
                .join("<br>")
        })
        .unwrap_or_default();

    let extra = [
        text_to_html(&card.extra),
        render_grading_table(&card.grading_table),
        text_to_html(&card.summary),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("<br><br>");

    [
        ("Front", card.front.clone()),
        ("Back", card.back.clone()),
        ("Original-Antwort", original_answer.to_string()),
        ("Optionen", options),
        ("Lösung", text_to_html(&card.solution)),
        ("Erklärung", text_to_html(&card.explanation)),
        ("Eselsbrücke", text_to_html(&card.mnemonic)),
        ("Referenz", text_to_html(&card.reference)),
        ("Extra 1", extra),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Render a card as a single labelled block for the source note's
/// `Extra 1` field. The labels double as the already-enriched markers.
pub fn render_in_place(card: &EnrichedCard) -> BTreeMap<String, String> {
    let mut sections = Vec::new();
    push_labelled(&mut sections, "Lösung:", &card.solution);
    push_labelled(&mut sections, "Erklärung:", &card.explanation);
    if !card.grading_table.is_empty() {
        sections.push(format!(
            "<b>Bewertungstabelle</b><br>{}",
            render_grading_table(&card.grading_table)
        ));
    }
    push_labelled(&mut sections, "Zusammenfassung:", &card.summary);
    push_labelled(&mut sections, "Eselsbrücke:", &card.mnemonic);
    push_labelled(&mut sections, "Referenz:", &card.reference);
    push_labelled(&mut sections, "Extra:", &card.extra);

    BTreeMap::from([(IN_PLACE_FIELD.to_string(), sections.join("<br><br>"))])
}

fn push_labelled(sections: &mut Vec<String>, label: &str, text: &str) {
    if !text.trim().is_empty() {
        sections.push(format!("<b>{label}</b> {}", text_to_html(text)));
    }
}

fn render_grading_table(rows: &[GradingRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let body: String = rows
        .iter()
        .map(|row| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&row.statement),
                row.verdict.label(),
                escape_html(&row.justification)
            )
        })
        .collect();
    format!("<table><tr><th>Aussage</th><th>Bewertung</th><th>Begründung</th></tr>{body}</table>")
}

fn text_to_html(text: &str) -> String {
    escape_html(text.trim()).replace("\r\n", "\n").replace('\n', "<br>")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fields::is_already_enriched;
    use crate::store::{NoteField, NoteInfo};
    use crate::types::{CardInput, EnrichmentFields, Verdict};

    fn fever() -> EnrichedCard {
        EnrichedCard::enriched(
            &CardInput {
                front: "Fever <b>causes</b>?".into(),
                back: "1 0 1".into(),
                options: vec!["Infection".into(), "Trauma".into(), "Sepsis".into()],
                answers: Some("1 0 1".into()),
                ..Default::default()
            },
            EnrichmentFields {
                solution: "Infection, Sepsis".into(),
                explanation: "Line one\nT < 38 °C & more".into(),
                grading_table: vec![GradingRow {
                    statement: "Trauma".into(),
                    verdict: Verdict::Incorrect,
                    justification: "Not infectious".into(),
                }],
                summary: "Infection first.".into(),
                mnemonic: "FIS".into(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_render_note_fields() {
        let fields = render_note(&fever());

        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        let mut expected = ENRICHED_FIELDS.to_vec();
        expected.sort_unstable();
        assert_eq!(names, expected);

        assert_eq!(fields["Front"], "Fever <b>causes</b>?");
        assert_eq!(fields["Original-Antwort"], "1 0 1");
        assert_eq!(fields["Optionen"], "1. Infection<br>2. Trauma<br>3. Sepsis");
        assert_eq!(fields["Erklärung"], "Line one<br>T &lt; 38 °C &amp; more");
        assert!(fields["Referenz"].is_empty());
        assert!(fields["Extra 1"].contains("<td>falsch</td>"));
        assert!(fields["Extra 1"].ends_with("Infection first."));
    }

    #[test]
    fn test_render_note_without_options() {
        let card = EnrichedCard::degraded(
            &CardInput {
                front: "Q".into(),
                back: "A".into(),
                ..Default::default()
            },
            "Generation error: x".into(),
            crate::types::Outcome::Failed,
        );
        let fields = render_note(&card);
        assert!(fields["Optionen"].is_empty());
        assert_eq!(fields["Original-Antwort"], "A");
        assert_eq!(fields["Lösung"], "A");
        assert!(fields["Extra 1"].is_empty());
    }

    #[test]
    fn test_in_place_rendering_is_detected_as_enriched() {
        let fields = render_in_place(&fever());
        let extra = &fields[IN_PLACE_FIELD];

        assert!(extra.starts_with("<b>Lösung:</b> Infection, Sepsis"));
        assert!(extra.contains("<b>Bewertungstabelle</b>"));
        assert!(extra.contains("<b>Zusammenfassung:</b> Infection first."));
        assert!(!extra.contains("Referenz:"));

        let note = NoteInfo {
            note_id: 1,
            fields: [(
                IN_PLACE_FIELD.to_string(),
                NoteField {
                    value: extra.clone(),
                    order: 0,
                },
            )]
            .into(),
            ..Default::default()
        };
        assert!(is_already_enriched(&note));
    }
}
