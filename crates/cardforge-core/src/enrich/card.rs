//! Single-card enrichment.

use super::prompt::{build_prompt, CardContext};
use crate::llm::FallbackChain;
use crate::normalize::{normalize, parse_tolerant};
use crate::types::{CardInput, EnrichedCard, Outcome};
use std::sync::Arc;

/// Prefix of the diagnostic written when every provider was out of quota.
pub const RATE_LIMIT_MARKER: &str = "Rate limit / quota exceeded";

/// Enriches one card at a time through a fallback chain.
#[derive(Clone)]
pub struct CardEnricher {
    chain: Arc<FallbackChain>,
}

impl CardEnricher {
    pub fn new(chain: Arc<FallbackChain>) -> Self {
        Self { chain }
    }

    /// Enrich a card. Never fails: any error becomes a degraded card whose
    /// solution is the original answer and whose explanation says what
    /// went wrong.
    pub async fn enrich_one(&self, card: &CardInput) -> EnrichedCard {
        let context = CardContext::from_card(card);
        let prompt = build_prompt(&context);

        let response = match self.chain.generate(&prompt).await {
            Ok(response) => response,
            Err(e) if e.is_rate_limited() => {
                tracing::warn!("Rate limited while enriching {:?}: {e}", context.front);
                return EnrichedCard::degraded(
                    card,
                    format!("{RATE_LIMIT_MARKER}: {e}. Try again later or switch provider."),
                    Outcome::RateLimited,
                );
            }
            Err(e) => {
                tracing::warn!("Generation failed for {:?}: {e}", context.front);
                return EnrichedCard::degraded(
                    card,
                    format!("Generation error: {e}"),
                    Outcome::Failed,
                );
            }
        };

        tracing::debug!(
            "Generated enrichment with {} in {}ms",
            response.model,
            response.latency_ms
        );

        match parse_tolerant(&response.text) {
            Ok(value) => EnrichedCard::enriched(card, normalize(&value, &card.back)),
            Err(e) => {
                tracing::warn!("Unparseable response for {:?}: {e}", context.front);
                EnrichedCard::degraded(
                    card,
                    format!("JSON processing error: {}", e.message),
                    Outcome::Failed,
                )
            }
        }
    }
}
