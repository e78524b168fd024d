//! Recovery of structured fields from free-form model output.
//!
//! Models wrap JSON in prose or code fences, emit raw newlines inside string
//! literals, leave trailing commas, and drift between accented, ASCII-folded
//! and English key names. This module extracts the JSON span, repairs it once
//! if needed, and maps the keys onto [`EnrichmentFields`].

use crate::error::ParseError;
use crate::types::{EnrichmentFields, GradingRow, Verdict};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Characters of raw text kept in a [`ParseError`].
const EXCERPT_LEN: usize = 500;

const SOLUTION_KEYS: &[&str] = &["lösung", "loesung", "losung", "antwort", "solution", "answer"];
const EXPLANATION_KEYS: &[&str] = &["erklärung", "erklaerung", "erklarung", "explanation"];
const MNEMONIC_KEYS: &[&str] = &["eselsbrücke", "eselsbruecke", "eselsbrucke", "mnemonic"];
const REFERENCE_KEYS: &[&str] = &["referenz", "reference", "quelle", "source"];
const EXTRA_KEYS: &[&str] = &["extra1", "extra 1", "extra_1", "extra"];
const SUMMARY_KEYS: &[&str] = &["zusammenfassung", "summary"];
const GRADING_KEYS: &[&str] = &["bewertungstabelle", "bewertung", "grading_table", "grading"];

const ROW_STATEMENT_KEYS: &[&str] = &["aussage", "statement", "option"];
const ROW_VERDICT_KEYS: &[&str] = &["bewertung", "verdict", "korrekt", "correct"];
const ROW_JUSTIFICATION_KEYS: &[&str] = &["begründung", "begruendung", "justification", "reason"];

/// Locate the JSON payload inside model output.
///
/// Strips a surrounding code fence, then takes the greedy span from the first
/// `{` to the last `}` (or `[` to `]` for list-shaped answers). Falls back to
/// the trimmed text so that parsing fails loudly rather than silently.
pub fn extract_json(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        let rest = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
        body = rest.trim_start();
        if let Some(inner) = body.trim_end().strip_suffix("```") {
            body = inner.trim();
        }
    }

    span(body, '{', '}')
        .or_else(|| span(body, '[', ']'))
        .unwrap_or(body)
}

fn span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse model output as JSON, with one repair pass.
///
/// The repair escapes raw control characters inside string literals and drops
/// trailing commas before `}` or `]`.
pub fn parse_tolerant(text: &str) -> Result<Value, ParseError> {
    let candidate = extract_json(text);
    if let Ok(value) = serde_json::from_str(candidate) {
        return Ok(value);
    }

    let repaired = repair(candidate);
    serde_json::from_str(&repaired).map_err(|e| {
        tracing::debug!("Unparseable model output after repair: {e}");
        ParseError {
            message: e.to_string(),
            excerpt: text.chars().take(EXCERPT_LEN).collect(),
        }
    })
}

/// Single left-to-right pass tracking whether the cursor is inside a string.
fn repair(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                out.push(ch);
                escaped = false;
                continue;
            }
            match ch {
                '\\' => {
                    out.push(ch);
                    escaped = true;
                }
                '"' => {
                    out.push(ch);
                    in_string = false;
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => {}
                c => out.push(c),
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Map a parsed response onto the canonical fields.
///
/// Keys are matched case-insensitively; for each field the first alias with a
/// non-empty value wins. A missing solution falls back to `fallback_answer`.
pub fn normalize(value: &Value, fallback_answer: &str) -> EnrichmentFields {
    let object = match value {
        Value::Object(map) => Some(map),
        // Some models wrap the object in a one-element list
        Value::Array(items) => items.iter().find_map(Value::as_object),
        _ => None,
    };
    let Some(object) = object else {
        return EnrichmentFields {
            solution: fallback_answer.to_string(),
            ..Default::default()
        };
    };

    let keys = lowercase_keys(object);
    EnrichmentFields {
        solution: pick_text(&keys, SOLUTION_KEYS).unwrap_or_else(|| fallback_answer.to_string()),
        explanation: pick_text(&keys, EXPLANATION_KEYS).unwrap_or_default(),
        grading_table: pick_grading_table(&keys),
        summary: pick_text(&keys, SUMMARY_KEYS).unwrap_or_default(),
        mnemonic: pick_text(&keys, MNEMONIC_KEYS).unwrap_or_default(),
        reference: pick_text(&keys, REFERENCE_KEYS).unwrap_or_default(),
        extra: pick_text(&keys, EXTRA_KEYS).unwrap_or_default(),
    }
}

fn lowercase_keys(object: &Map<String, Value>) -> HashMap<String, &Value> {
    let mut keys = HashMap::with_capacity(object.len());
    for (key, value) in object {
        keys.entry(key.trim().to_lowercase()).or_insert(value);
    }
    keys
}

fn pick_text(keys: &HashMap<String, &Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| keys.get(*alias))
        .find_map(|value| as_text(value))
}

/// Scalar or list-of-scalars as trimmed, non-empty text.
fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(as_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null | Value::Object(_) => String::new(),
    };
    (!text.is_empty()).then_some(text)
}

fn pick_grading_table(keys: &HashMap<String, &Value>) -> Vec<GradingRow> {
    GRADING_KEYS
        .iter()
        .filter_map(|alias| keys.get(*alias))
        .filter_map(|value| value.as_array())
        .map(|rows| rows.iter().filter_map(grading_row).collect::<Vec<_>>())
        .find(|rows| !rows.is_empty())
        .unwrap_or_default()
}

fn grading_row(value: &Value) -> Option<GradingRow> {
    let keys = lowercase_keys(value.as_object()?);
    let statement = pick_text(&keys, ROW_STATEMENT_KEYS)?;
    let verdict = ROW_VERDICT_KEYS
        .iter()
        .filter_map(|alias| keys.get(*alias))
        .find_map(|v| Verdict::from_value(v))?;
    Some(GradingRow {
        statement,
        verdict,
        justification: pick_text(&keys, ROW_JUSTIFICATION_KEYS).unwrap_or_default(),
    })
}
