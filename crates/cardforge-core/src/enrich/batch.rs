//! Sequential batch enrichment with pacing, early stop and resume.
//!
//! Cards are enriched strictly one after another in input order, with a
//! pause between requests. When a card comes back rate limited the rest of
//! the batch is not attempted: those cards get a skipped placeholder and the
//! caller retries the remaining range later.

use super::card::CardEnricher;
use super::checkpoint::{BatchProgress, Checkpoint};
use crate::error::CheckpointError;
use crate::llm::FallbackChain;
use crate::types::{CardInput, EnrichedCard, Outcome};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// Result of a batch run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Exactly one entry per input card, in input order
    pub cards: Vec<EnrichedCard>,
    /// Cards actually completed; stops before a rate-limited card
    pub completed: usize,
}

impl BatchOutcome {
    pub fn stopped_early(&self) -> bool {
        self.completed < self.cards.len()
    }

    pub fn enriched_count(&self) -> usize {
        self.cards.iter().filter(|c| c.is_enriched()).count()
    }
}

/// One page of a chunked run over a larger card list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    pub offset: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    pub enriched: Vec<EnrichedCard>,
    /// `offset` plus the number of cards actually completed
    pub next_offset: usize,
    pub total: usize,
    pub has_more: bool,
}

/// Drives a [`CardEnricher`] across many cards.
#[derive(Clone)]
pub struct BatchEnricher {
    enricher: CardEnricher,
    delay: Duration,
}

impl BatchEnricher {
    pub fn new(chain: Arc<FallbackChain>, delay: Duration) -> Self {
        Self {
            enricher: CardEnricher::new(chain),
            delay,
        }
    }

    /// Override the pause between cards for this enricher.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Enrich `cards` in order. `on_progress(done, total)` runs after every
    /// card that was sent to a provider.
    pub async fn enrich_many<F>(&self, cards: &[CardInput], mut on_progress: F) -> BatchOutcome
    where
        F: FnMut(usize, usize),
    {
        let total = cards.len();
        self.drive::<_, Infallible>(cards, Vec::new(), |offset, _| {
            on_progress(offset + 1, total);
            Ok(())
        })
        .await
        .unwrap_or_else(|never| match never {})
    }

    /// Like [`enrich_many`](Self::enrich_many), persisting progress under
    /// `key` after every card and resuming from it.
    ///
    /// Saved progress is discarded unless it was recorded for the same
    /// cards (same count, same ids and fronts in the saved prefix). The
    /// checkpoint is cleared once every card is done; after an early stop it
    /// keeps the completed prefix plus an error entry.
    pub async fn enrich_resumable<F>(
        &self,
        key: &str,
        cards: &[CardInput],
        checkpoint: &dyn Checkpoint,
        mut on_progress: F,
    ) -> Result<BatchOutcome, CheckpointError>
    where
        F: FnMut(usize, usize),
    {
        let total = cards.len();
        let mut progress = match checkpoint.load(key)? {
            Some(saved) if saved.is_resumable_for(cards) => {
                tracing::info!("Resuming {key} at {}/{total}", saved.processed);
                saved
            }
            Some(saved) => {
                tracing::warn!(
                    "Discarding checkpoint {key}: saved for {} other cards, batch has {total}",
                    saved.total
                );
                BatchProgress::new(total)
            }
            None => BatchProgress::new(total),
        };

        if progress.processed > 0 {
            on_progress(progress.processed, total);
        }

        let done = progress.enriched.clone();
        let outcome = self
            .drive::<_, CheckpointError>(cards, done, |offset, card| {
                if card.outcome == Outcome::RateLimited {
                    progress.record_error(offset, card.explanation.clone());
                } else {
                    progress.record(card.clone());
                }
                checkpoint.save(key, &progress)?;
                on_progress(offset + 1, total);
                Ok(())
            })
            .await?;

        if !outcome.stopped_early() {
            checkpoint.clear(key)?;
        }
        Ok(outcome)
    }

    /// Enrich `cards[offset..offset + batch_size]`.
    ///
    /// `next_offset` advances only past cards that were actually completed,
    /// so a resumed loop never skips or repeats a card.
    pub async fn enrich_chunk(&self, cards: &[CardInput], request: ChunkRequest) -> ChunkResponse {
        let total = cards.len();
        let start = request.offset.min(total);
        let end = start.saturating_add(request.batch_size).min(total);

        let outcome = self.enrich_many(&cards[start..end], |_, _| {}).await;
        let next_offset = start + outcome.completed;

        ChunkResponse {
            enriched: outcome.cards,
            next_offset,
            total,
            has_more: next_offset < total,
        }
    }

    /// Core loop. `done` holds already-completed cards; enrichment continues
    /// at `done.len()`. `after_card` sees every card that was sent.
    async fn drive<F, E>(
        &self,
        cards: &[CardInput],
        mut done: Vec<EnrichedCard>,
        mut after_card: F,
    ) -> Result<BatchOutcome, E>
    where
        F: FnMut(usize, &EnrichedCard) -> Result<(), E>,
    {
        let start = done.len().min(cards.len());
        done.truncate(start);

        for (offset, card) in cards.iter().enumerate().skip(start) {
            if offset > start && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let enriched = self.enricher.enrich_one(card).await;
            let rate_limited = enriched.outcome == Outcome::RateLimited;
            after_card(offset, &enriched)?;
            done.push(enriched);

            if rate_limited {
                let remaining = cards.len() - offset - 1;
                tracing::warn!(
                    "Rate limit reached at card {}/{}; skipping {remaining} remaining",
                    offset + 1,
                    cards.len()
                );
                done.extend(cards[offset + 1..].iter().map(EnrichedCard::skipped));
                return Ok(BatchOutcome {
                    cards: done,
                    completed: offset,
                });
            }
        }

        tracing::info!("Enriched {} cards", cards.len() - start);
        Ok(BatchOutcome {
            cards: done,
            completed: cards.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::checkpoint::{checkpoint_key, MemoryCheckpoint};
    use crate::llm::mock::{chain, rate_limit, MockProvider};
    use std::sync::atomic::Ordering;

    fn cards(n: usize) -> Vec<CardInput> {
        (0..n)
            .map(|i| CardInput {
                front: format!("Frage {i}"),
                back: format!("Antwort {i}"),
                ..Default::default()
            })
            .collect()
    }

    /// Echoes the card number found in the prompt back as the solution.
    fn echo_provider() -> MockProvider {
        MockProvider::new("gemini", |idx| Ok(format!("{{\"lösung\": \"L{idx}\"}}")))
    }

    fn batch(provider: MockProvider) -> BatchEnricher {
        BatchEnricher::new(Arc::new(chain(vec![provider], 0)), Duration::ZERO)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_output_matches_input_length_and_order() {
        let provider = MockProvider::new("gemini", |idx| {
            if idx % 2 == 0 {
                Ok(format!("{{\"lösung\": \"L{idx}\"}}"))
            } else {
                Err(crate::llm::mock::server_error("gemini"))
            }
        });
        let mut seen = Vec::new();
        let outcome = batch(provider)
            .enrich_many(&cards(5), |done, total| seen.push((done, total)))
            .await;

        assert_eq!(outcome.cards.len(), 5);
        assert_eq!(outcome.completed, 5);
        for (i, card) in outcome.cards.iter().enumerate() {
            assert_eq!(card.front, format!("Frage {i}"));
        }
        assert_eq!(outcome.cards[0].solution, "L0");
        assert_eq!(outcome.cards[1].solution, "Antwort 1");
        assert_eq!(outcome.enriched_count(), 3);
        assert_eq!(seen, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rate_limit_stops_the_batch() {
        let provider = MockProvider::new("gemini", |idx| {
            if idx == 0 {
                Ok("{\"lösung\": \"ok\"}".to_string())
            } else {
                Err(rate_limit("gemini"))
            }
        });
        let calls = provider.call_count_handle();

        let outcome = batch(provider).enrich_many(&cards(4), |_, _| {}).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.cards.len(), 4);
        assert_eq!(outcome.completed, 1);
        assert!(outcome.stopped_early());
        assert_eq!(outcome.cards[1].outcome, Outcome::RateLimited);
        assert_eq!(outcome.cards[2].outcome, Outcome::Skipped);
        assert_eq!(outcome.cards[3].outcome, Outcome::Skipped);
        assert_eq!(outcome.cards[3].solution, "Antwort 3");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_both_providers_exhausted_skips_remaining_cards() {
        let primary = MockProvider::failing("gemini", rate_limit);
        let fallback = MockProvider::failing("together", rate_limit);
        let (p_calls, f_calls) = (primary.call_count_handle(), fallback.call_count_handle());
        let enricher = BatchEnricher::new(Arc::new(chain(vec![primary, fallback], 1)), Duration::ZERO);

        let outcome = enricher.enrich_many(&cards(3), |_, _| {}).await;

        assert!(outcome.cards[0].explanation.contains("Rate limit / quota exceeded"));
        assert_eq!(outcome.cards[1].outcome, Outcome::Skipped);
        assert_eq!(outcome.cards[2].outcome, Outcome::Skipped);
        assert_eq!(outcome.completed, 0);
        // Only the first card reached the providers
        assert_eq!(p_calls.load(Ordering::SeqCst), 2);
        assert_eq!(f_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resume_matches_uninterrupted_run() {
        let input = cards(5);
        let key = checkpoint_key("Kardiologie");

        // Uninterrupted reference run
        let reference = batch(echo_provider()).enrich_many(&input, |_, _| {}).await;

        // Interrupted: quota runs out on the fourth card
        let checkpoint = MemoryCheckpoint::new();
        let flaky = MockProvider::new("gemini", |idx| {
            if idx < 3 {
                Ok(format!("{{\"lösung\": \"L{idx}\"}}"))
            } else {
                Err(rate_limit("gemini"))
            }
        });
        let first = batch(flaky)
            .enrich_resumable(&key, &input, &checkpoint, |_, _| {})
            .await
            .unwrap();
        assert_eq!(first.completed, 3);

        let saved = checkpoint.load(&key).unwrap().unwrap();
        assert_eq!(saved.processed, 3);
        assert_eq!(saved.errors.len(), 1);
        assert_eq!(saved.errors[0].offset, 3);

        // Resume: only the two remaining cards are requested
        let resumed_provider =
            MockProvider::new("gemini", |idx| Ok(format!("{{\"lösung\": \"L{}\"}}", idx + 3)));
        let calls = resumed_provider.call_count_handle();
        let mut progress_calls = Vec::new();
        let second = batch(resumed_provider)
            .enrich_resumable(&key, &input, &checkpoint, |done, total| {
                progress_calls.push((done, total))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.completed, 5);
        assert_eq!(progress_calls, vec![(3, 5), (4, 5), (5, 5)]);
        assert_eq!(
            serde_json::to_string(&second.cards[..3]).unwrap(),
            serde_json::to_string(&first.cards[..3]).unwrap()
        );
        assert_eq!(second.cards, reference.cards);
        assert!(checkpoint.load(&key).unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mismatched_checkpoint_is_discarded() {
        let checkpoint = MemoryCheckpoint::new();
        let mut stale = BatchProgress::new(10);
        stale.record(EnrichedCard::skipped(&cards(1)[0]));
        checkpoint.save("deck_x", &stale).unwrap();

        let provider = echo_provider();
        let calls = provider.call_count_handle();
        let outcome = batch(provider)
            .enrich_resumable("deck_x", &cards(2), &checkpoint, |_, _| {})
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.cards[0].solution, "L0");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_checkpoint_for_other_cards_is_not_spliced_in() {
        let named = |fronts: &[&str]| -> Vec<CardInput> {
            fronts
                .iter()
                .map(|f| CardInput {
                    front: f.to_string(),
                    back: format!("Antwort {f}"),
                    id: Some(f.to_string()),
                    ..Default::default()
                })
                .collect()
        };
        let key = format!("{}@5", checkpoint_key("k"));
        let checkpoint = MemoryCheckpoint::new();

        // Earlier run over X, Y, Z stopped after two cards
        let earlier = named(&["X", "Y", "Z"]);
        let mut saved = BatchProgress::new(3);
        saved.record(EnrichedCard::skipped(&earlier[0]));
        saved.record(EnrichedCard::skipped(&earlier[1]));
        checkpoint.save(&key, &saved).unwrap();

        // Same key and length, different cards
        let provider = echo_provider();
        let calls = provider.call_count_handle();
        let outcome = batch(provider)
            .enrich_resumable(&key, &named(&["P", "Q", "R"]), &checkpoint, |_, _| {})
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let fronts: Vec<&str> = outcome.cards.iter().map(|c| c.front.as_str()).collect();
        assert_eq!(fronts, vec!["P", "Q", "R"]);
        let ids: Vec<Option<&str>> = outcome.cards.iter().map(|c| c.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("P"), Some("Q"), Some("R")]);
        assert!(outcome.cards.iter().all(|c| c.is_enriched()));
        assert!(checkpoint.load(&key).unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_chunk_next_offset_counts_completed_cards() {
        let input = cards(7);

        let full = batch(echo_provider())
            .enrich_chunk(&input, ChunkRequest { offset: 0, batch_size: 5 })
            .await;
        assert_eq!(full.enriched.len(), 5);
        assert_eq!(full.next_offset, 5);
        assert_eq!(full.total, 7);
        assert!(full.has_more);

        let last = batch(echo_provider())
            .enrich_chunk(&input, ChunkRequest { offset: 5, batch_size: 5 })
            .await;
        assert_eq!(last.enriched.len(), 2);
        assert_eq!(last.enriched[0].front, "Frage 5");
        assert_eq!(last.next_offset, 7);
        assert!(!last.has_more);

        let limited = MockProvider::new("gemini", |idx| {
            if idx == 0 {
                Ok("{\"lösung\": \"ok\"}".into())
            } else {
                Err(rate_limit("gemini"))
            }
        });
        let stopped = batch(limited)
            .enrich_chunk(&input, ChunkRequest { offset: 2, batch_size: 5 })
            .await;
        assert_eq!(stopped.enriched.len(), 5);
        assert_eq!(stopped.next_offset, 3);
        assert!(stopped.has_more);

        let past_end = batch(echo_provider())
            .enrich_chunk(&input, ChunkRequest { offset: 9, batch_size: 5 })
            .await;
        assert!(past_end.enriched.is_empty());
        assert_eq!(past_end.next_offset, 7);
        assert!(!past_end.has_more);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_requests_are_paced() {
        let enricher = batch(echo_provider()).with_delay(Duration::from_millis(30));
        let start = std::time::Instant::now();
        enricher.enrich_many(&cards(3), |_, _| {}).await;
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
