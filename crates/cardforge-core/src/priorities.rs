//! Study-priority suggestions for a deck.
//!
//! The model is shown a stride sample of the deck and asked for the most
//! important overarching topics. A failed model call is reported as such
//! (method `fallback` with an error and no priorities); the separate
//! [`frequency_priorities`] heuristic ranks cards by shared vocabulary when
//! no model is reachable at all.

use crate::enrich::sanitize::{collapse_whitespace, sanitize, truncate};
use crate::error::ConfigError;
use crate::llm::FallbackChain;
use crate::normalize::parse_tolerant;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_TOP_N: usize = 15;
pub const MAX_TOP_N: usize = 50;
/// Cards shown to the model at most.
pub const SAMPLE_CEILING: usize = 120;
const MAX_FRONT_CHARS: usize = 180;

const STOPWORDS: &[&str] = &[
    "der", "die", "das", "und", "oder", "ein", "eine", "einer", "eines", "im", "in", "am", "an",
    "auf", "für", "fur", "mit", "ohne", "von", "zu", "zum", "zur", "des", "den", "dem", "dass",
    "ist", "sind", "bei", "als", "auch", "nicht", "kein", "keine", "was", "wie", "welche",
    "welcher", "welches", "the", "and", "or", "with", "without", "from", "into", "that", "this",
    "these", "those",
];

/// A card considered for prioritization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityCard {
    pub id: String,
    pub front: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One suggested study topic, anchored on a representative card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritySuggestion {
    pub id: String,
    /// Dense rank starting at 1
    pub rank: usize,
    pub front: String,
    pub topic: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_goals: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityMethod {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityReport {
    pub priorities: Vec<PrioritySuggestion>,
    pub method: PriorityMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriorityReport {
    fn failed(error: String) -> Self {
        tracing::warn!("Priority analysis failed: {error}");
        Self {
            priorities: Vec::new(),
            method: PriorityMethod::Fallback,
            error: Some(error),
        }
    }
}

struct Candidate {
    id: String,
    topic: String,
    reason: String,
    learning_goals: Option<Vec<String>>,
}

/// Ask the model for the `top_n` most important topics of `cards`.
///
/// `chain` is the outcome of provider resolution; a configuration error is
/// reported in the result rather than propagated.
pub async fn suggest_top_priorities(
    cards: &[PriorityCard],
    top_n: usize,
    chain: Result<&FallbackChain, &ConfigError>,
) -> PriorityReport {
    let top_n = top_n.clamp(1, MAX_TOP_N);
    let cleaned = clean_cards(cards);
    if cleaned.is_empty() {
        return PriorityReport::failed("No valid cards found".to_string());
    }

    let chain = match chain {
        Ok(chain) => chain,
        Err(e) => return PriorityReport::failed(format!("LLM unavailable: {e}. Check the API key.")),
    };

    let sample = stride_sample(&cleaned, SAMPLE_CEILING);
    if sample.len() < cleaned.len() {
        tracing::info!(
            "Sampling {} of {} cards for priority analysis",
            sample.len(),
            cleaned.len()
        );
    }

    let response = match chain.generate(&build_priority_prompt(&sample, top_n)).await {
        Ok(response) => response,
        Err(e) => return PriorityReport::failed(format!("LLM analysis failed: {e}")),
    };
    let candidates = match parse_tolerant(&response.text)
        .map_err(|e| e.to_string())
        .and_then(|value| parse_candidates(&value, &sample, top_n))
    {
        Ok(candidates) => candidates,
        Err(e) => return PriorityReport::failed(format!("LLM analysis failed: {e}")),
    };

    let priorities = rank_candidates(candidates, &cleaned, top_n);
    if priorities.is_empty() {
        return PriorityReport::failed("LLM analysis failed: no topics identified".to_string());
    }
    PriorityReport {
        priorities,
        method: PriorityMethod::Llm,
        error: None,
    }
}

/// Deterministic ranking by shared vocabulary, for when no model is reachable.
///
/// Each card scores the sum of the deck-wide frequencies of its unique tokens,
/// divided by the square root of its token count. The top `top_n` cards are
/// returned with their most frequent token as the topic.
pub fn frequency_priorities(cards: &[PriorityCard], top_n: usize) -> Vec<PrioritySuggestion> {
    let top_n = top_n.clamp(1, MAX_TOP_N);
    let cleaned = clean_cards(cards);

    let card_tokens: Vec<Vec<String>> = cleaned
        .iter()
        .map(|card| {
            let content = std::iter::once(card.front.as_str())
                .chain(card.options.iter().map(String::as_str))
                .chain(card.tags.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            unique_tokens(&content)
        })
        .collect();

    let mut frequency: HashMap<&str, usize> = HashMap::new();
    for tokens in &card_tokens {
        for token in tokens {
            *frequency.entry(token.as_str()).or_default() += 1;
        }
    }

    let mut scored: Vec<(usize, f64, &str)> = card_tokens
        .iter()
        .enumerate()
        .map(|(idx, tokens)| {
            let sum: usize = tokens.iter().map(|t| frequency[t.as_str()]).sum();
            let score = sum as f64 / (tokens.len().max(1) as f64).sqrt();
            let mut best = ("", 0usize);
            for token in tokens {
                let freq = frequency[token.as_str()];
                if freq > best.1 {
                    best = (token.as_str(), freq);
                }
            }
            (idx, score, best.0)
        })
        .collect();
    // Stable: equal scores keep deck order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(rank, (idx, _, token))| {
            let card = &cleaned[idx];
            let topic = if token.is_empty() { "Grundlagen" } else { token };
            PrioritySuggestion {
                id: card.id.clone(),
                rank: rank + 1,
                front: card.front.clone(),
                topic: topic.to_string(),
                reason: format!("Häufiges Thema im Deck; deckt zentrale Begriffe wie \"{topic}\" ab."),
                learning_goals: Some(vec![
                    format!("Kernkonzepte zu \"{topic}\" verstehen"),
                    "Klinische Relevanz einordnen".to_string(),
                ]),
            }
        })
        .collect()
}

fn clean_cards(cards: &[PriorityCard]) -> Vec<PriorityCard> {
    cards
        .iter()
        .map(|card| PriorityCard {
            id: card.id.trim().to_string(),
            front: sanitize(&card.front),
            options: card.options.iter().map(|o| sanitize(o)).collect(),
            tags: card.tags.iter().map(|t| collapse_whitespace(t)).collect(),
        })
        .filter(|card| !card.id.is_empty() && !card.front.is_empty())
        .collect()
}

/// Every `len / ceiling`-th card, at most `ceiling` of them.
fn stride_sample<T: Clone>(items: &[T], ceiling: usize) -> Vec<T> {
    if items.len() <= ceiling {
        return items.to_vec();
    }
    let step = (items.len() / ceiling).max(1);
    items.iter().step_by(step).take(ceiling).cloned().collect()
}

fn build_priority_prompt(sample: &[PriorityCard], top_n: usize) -> String {
    let lines = sample
        .iter()
        .enumerate()
        .map(|(idx, card)| format!("[{idx}] {}", truncate(&card.front, MAX_FRONT_CHARS)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Du bist ein Lerncoach für Medizinstudierende.
Analysiere die folgenden Lernkarten und identifiziere die TOP {top_n} WICHTIGSTEN THEMEN für den 80/20-Lernerfolg.

WICHTIG:
- Gruppiere nach ÜBERGEORDNETEN THEMEN, nicht einzelnen Fragen
- Jedes Thema sollte ein klinisch relevantes Konzept sein
- Nenne konkrete Lernziele

Antworte NUR mit diesem JSON (keine Erklärungen davor/danach):
{{
  "themen": [
    {{
      "index": 0,
      "thema": "Beispiel: Angeborene Herzfehler im Neugeborenenscreening",
      "wichtigkeit": "Häufige Prüfungsfrage, klinisch hochrelevant",
      "lernziele": ["Kritische Herzfehler erkennen", "Screening-Methoden verstehen"]
    }}
  ]
}}

Die Karten (mit Index):
{lines}"#
    )
}

fn parse_candidates(
    value: &Value,
    sample: &[PriorityCard],
    top_n: usize,
) -> Result<Vec<Candidate>, String> {
    let list = match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => ["themen", "priorities", "topics", "items"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    };
    let list = match list {
        Some(list) if !list.is_empty() => list,
        _ => return Err("no topics identified".to_string()),
    };

    let mut candidates = Vec::new();
    for (position, entry) in list.iter().enumerate() {
        if candidates.len() >= top_n {
            break;
        }
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let index = entry
            .get("index")
            .and_then(Value::as_u64)
            .map(|i| i as usize)
            .unwrap_or(position);
        let id = sample
            .get(index)
            .or_else(|| sample.get(position))
            .map(|card| card.id.clone())
            .unwrap_or_else(|| position.to_string());

        let text = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| entry.get(*k).and_then(Value::as_str))
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(String::from)
        };
        let learning_goals = ["lernziele", "learningGoals"]
            .iter()
            .find_map(|k| entry.get(*k).and_then(Value::as_array))
            .map(|goals| {
                goals
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect::<Vec<_>>()
            });

        candidates.push(Candidate {
            id,
            topic: text(&["thema", "topic", "name"]).unwrap_or_else(|| "Kernthema".to_string()),
            reason: text(&["wichtigkeit", "reason", "grund"])
                .unwrap_or_else(|| "Prüfungsrelevantes Konzept.".to_string()),
            learning_goals,
        });
    }

    if candidates.is_empty() {
        return Err("could not extract topics from the response".to_string());
    }
    Ok(candidates)
}

/// Lowercased, trimmed, whitespace-collapsed topic label.
fn topic_key(topic: &str) -> String {
    collapse_whitespace(&topic.to_lowercase())
}

/// Drop unknown cards and repeated topics, then rank densely from 1.
fn rank_candidates(
    candidates: Vec<Candidate>,
    cleaned: &[PriorityCard],
    top_n: usize,
) -> Vec<PrioritySuggestion> {
    let by_id: HashMap<&str, &PriorityCard> =
        cleaned.iter().map(|card| (card.id.as_str(), card)).collect();
    let mut seen_topics = HashSet::new();
    let mut priorities = Vec::new();

    for candidate in candidates {
        let Some(card) = by_id.get(candidate.id.as_str()) else {
            continue;
        };
        if !seen_topics.insert(topic_key(&candidate.topic)) {
            continue;
        }
        priorities.push(PrioritySuggestion {
            id: candidate.id,
            rank: priorities.len() + 1,
            front: card.front.clone(),
            topic: candidate.topic,
            reason: candidate.reason,
            learning_goals: candidate.learning_goals,
        });
        if priorities.len() >= top_n {
            break;
        }
    }
    priorities
}

fn unique_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut seen = HashSet::new();
    lower
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || "äöüß".contains(c)))
        .filter(|t| t.chars().count() >= 3 && !STOPWORDS.contains(t))
        .filter(|t| seen.insert(*t))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{chain, server_error, MockProvider};

    fn card(id: &str, front: &str) -> PriorityCard {
        PriorityCard {
            id: id.into(),
            front: front.into(),
            ..Default::default()
        }
    }

    fn deck() -> Vec<PriorityCard> {
        vec![
            card("10", "Symptome der Herzinsuffizienz?"),
            card("11", "Therapie der Herzinsuffizienz?"),
            card("12", "Ursachen der Pneumonie?"),
            card("13", "Erreger der Pneumonie bei Kindern?"),
        ]
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ranks_are_dense_after_dedup() {
        let response = r#"{"themen": [
            {"index": 1, "thema": "Herzinsuffizienz", "wichtigkeit": "häufig", "lernziele": ["NYHA"]},
            {"index": 0, "thema": "  herzinsuffizienz ", "wichtigkeit": "doppelt"},
            {"index": 7, "thema": "Pneumonie", "wichtigkeit": "klinisch relevant"},
            {"index": 2, "topic": "Pneumonie", "reason": "doppelt"},
            {"index": 3, "name": "Pädiatrische Infektionen"}
        ]}"#;
        let chain = chain(vec![MockProvider::success("gemini", response)], 0);

        let report = suggest_top_priorities(&deck(), 10, Ok(&chain)).await;

        assert_eq!(report.method, PriorityMethod::Llm);
        assert!(report.error.is_none());
        let ranks: Vec<usize> = report.priorities.iter().map(|p| p.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);

        let topics: Vec<&str> = report.priorities.iter().map(|p| p.topic.as_str()).collect();
        assert_eq!(topics, vec!["Herzinsuffizienz", "Pneumonie", "Pädiatrische Infektionen"]);

        // Out-of-range index falls back to the list position
        assert_eq!(report.priorities[1].id, "12");
        assert_eq!(report.priorities[0].id, "11");
        assert_eq!(report.priorities[0].learning_goals, Some(vec!["NYHA".to_string()]));
        assert_eq!(report.priorities[2].reason, "Prüfungsrelevantes Konzept.");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_top_n_limits_results() {
        let response = r#"[{"index":0,"thema":"A"},{"index":1,"thema":"B"},{"index":2,"thema":"C"}]"#;
        let chain = chain(vec![MockProvider::success("gemini", response)], 0);
        let report = suggest_top_priorities(&deck(), 2, Ok(&chain)).await;
        assert_eq!(report.priorities.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_config_error_is_reported() {
        let err = ConfigError::MissingCredential {
            provider: "gemini".into(),
            hint: "GEMINI_API_KEY".into(),
        };
        let report = suggest_top_priorities(&deck(), 5, Err(&err)).await;
        assert_eq!(report.method, PriorityMethod::Fallback);
        assert!(report.priorities.is_empty());
        assert!(report.error.unwrap().starts_with("LLM unavailable"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generation_and_parse_failures_are_reported() {
        let failing = chain(vec![MockProvider::failing("gemini", server_error)], 0);
        let report = suggest_top_priorities(&deck(), 5, Ok(&failing)).await;
        assert_eq!(report.method, PriorityMethod::Fallback);
        assert!(report.error.unwrap().contains("All providers failed"));

        let prose = chain(vec![MockProvider::success("gemini", "Keine Themen.")], 0);
        let report = suggest_top_priorities(&deck(), 5, Ok(&prose)).await;
        assert!(report.priorities.is_empty());
        assert!(report.error.is_some());

        let empty = chain(vec![MockProvider::success("gemini", "{\"themen\": []}")], 0);
        let report = suggest_top_priorities(&deck(), 5, Ok(&empty)).await;
        assert!(report.error.unwrap().contains("no topics"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_valid_cards() {
        let chain = chain(vec![MockProvider::success("gemini", "{}")], 0);
        let cards = vec![card("", "Frage"), card("1", "<br>")];
        let report = suggest_top_priorities(&cards, 5, Ok(&chain)).await;
        assert_eq!(report.error.as_deref(), Some("No valid cards found"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_large_deck_is_stride_sampled() {
        let cards: Vec<PriorityCard> = (0..300)
            .map(|i| card(&i.to_string(), &format!("Frage {i}")))
            .collect();
        let provider = MockProvider::success("gemini", r#"{"themen":[{"index":1,"thema":"X"}]}"#);
        let prompts = provider.prompts_handle();
        let chain = chain(vec![provider], 0);

        let report = suggest_top_priorities(&cards, 5, Ok(&chain)).await;

        let prompt = prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("[119] Frage 238"));
        assert!(!prompt.contains("[120]"));
        // Sample index 1 is deck card 2
        assert_eq!(report.priorities[0].id, "2");
    }

    #[test]
    fn test_stride_sample_small_input_unchanged() {
        assert_eq!(stride_sample(&[1, 2, 3], 120), vec![1, 2, 3]);
        assert_eq!(stride_sample(&(0..10).collect::<Vec<_>>(), 4), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_tokenizer() {
        assert_eq!(
            unique_tokens("Die Therapie der Herzinsuffizienz: ACE-Hemmer, Therapie!"),
            vec!["therapie", "herzinsuffizienz", "ace", "hemmer"]
        );
        assert_eq!(unique_tokens("Übelkeit & Fieber"), vec!["übelkeit", "fieber"]);
    }

    #[test]
    fn test_frequency_priorities() {
        let mut cards = deck();
        cards.push(card("14", "Was ist das?"));
        let priorities = frequency_priorities(&cards, 3);

        assert_eq!(priorities.len(), 3);
        assert_eq!(
            priorities.iter().map(|p| p.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let topics: Vec<&str> = priorities.iter().map(|p| p.topic.as_str()).collect();
        assert!(topics.contains(&"herzinsuffizienz") || topics.contains(&"pneumonie"));
        assert!(priorities[0].reason.contains(&priorities[0].topic));
    }

    #[test]
    fn test_frequency_topic_defaults_to_grundlagen() {
        let priorities = frequency_priorities(&[card("1", "Was ist das?")], 5);
        assert_eq!(priorities.len(), 1);
        assert_eq!(priorities[0].topic, "Grundlagen");
    }
}
