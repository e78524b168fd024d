//! Enrichment setup: provider chain, store connection, card window.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cardforge_core::store::{deck_cards, DeckCard};
use cardforge_core::{AnkiConnect, BatchEnricher, FileCheckpoint};

use super::super::AppContext;
use super::EnrichArgs;

/// Everything a run needs, assembled once.
pub(crate) struct EnrichSetup {
    pub store: AnkiConnect,
    pub batch: BatchEnricher,
    pub checkpoint: FileCheckpoint,
    pub providers: Vec<String>,
    /// The cards of this run, in deck order
    pub cards: Vec<DeckCard>,
    pub batch_size: usize,
}

/// Resolve providers, connect to Anki and select the card window.
///
/// Provider resolution runs first so a missing key fails before any store
/// traffic.
pub(crate) async fn setup_enrichment(
    ctx: &AppContext,
    args: &EnrichArgs,
) -> anyhow::Result<EnrichSetup> {
    let chain = ctx.chain(&args.llm.overrides())?;
    let providers = chain
        .provider_names()
        .into_iter()
        .map(String::from)
        .collect();

    let delay = args
        .delay_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| ctx.config.request_delay(&ctx.env));
    let batch = BatchEnricher::new(Arc::new(chain), delay);

    let store = ctx.store().await?;
    let all = deck_cards(&store, &args.deck, args.skip_enriched).await?;
    let cards = select_window(all, args.offset, args.limit.unwrap_or(ctx.config.batch.limit));

    let checkpoint_path = match &args.checkpoint {
        Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned()),
        None => ctx.config.checkpoint_path(),
    };
    tracing::debug!("Checkpoint file: {:?}", checkpoint_path);

    let batch_size = args
        .batch_size
        .unwrap_or(ctx.config.batch.batch_size)
        .max(1);

    Ok(EnrichSetup {
        store,
        batch,
        checkpoint: FileCheckpoint::new(checkpoint_path),
        providers,
        cards,
        batch_size,
    })
}

/// Cards at deck position `offset` or later, at most `limit` of them.
fn select_window(cards: Vec<DeckCard>, offset: usize, limit: usize) -> Vec<DeckCard> {
    cards
        .into_iter()
        .skip_while(|card| card.position < offset)
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: u64) -> DeckCard {
        DeckCard {
            note_id: id,
            position: id as usize,
            front: format!("Q{id}"),
            back: String::new(),
            options: vec![],
            tags: vec![],
            note_type: "Basic".into(),
        }
    }

    #[test]
    fn window_respects_offset_and_limit() {
        let cards: Vec<DeckCard> = (0..10).map(card).collect();
        let window = select_window(cards.clone(), 3, 4);
        assert_eq!(
            window.iter().map(|c| c.note_id).collect::<Vec<_>>(),
            vec![3, 4, 5, 6]
        );
        assert!(select_window(cards, 20, 4).is_empty());
    }

    #[test]
    fn window_offset_is_a_deck_position() {
        // Positions 0, 1, 4 and 5 were filtered out as already enriched
        let cards: Vec<DeckCard> = [2, 3, 6, 7, 8].into_iter().map(card).collect();
        let window = select_window(cards, 3, 2);
        assert_eq!(
            window.iter().map(|c| c.position).collect::<Vec<_>>(),
            vec![3, 6]
        );
    }
}
