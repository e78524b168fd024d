//! Chunked deck enrichment with progress, checkpointing and sync.

use std::collections::HashMap;
use std::time::Duration;

use cardforge_core::store::{render_in_place, render_note, DeckCard, NewNote};
use cardforge_core::{checkpoint_key, Checkpoint, EnrichedCard, NoteStore, Outcome};

use super::super::create_progress_bar;
use super::setup::EnrichSetup;
use super::types::{RunSummary, SyncMode};
use super::EnrichArgs;

/// Tag added to every note created by Cardforge.
const ENRICHED_TAG: &str = "cardforge";

/// Enrich the card window chunk by chunk, syncing each chunk before the
/// next one starts. Stops at the first chunk that hit the rate limit.
///
/// Returns the run summary and every completed card.
pub(crate) async fn run_chunks(
    setup: &EnrichSetup,
    args: &EnrichArgs,
) -> anyhow::Result<(RunSummary, Vec<EnrichedCard>)> {
    let total = setup.cards.len();
    let progress = create_progress_bar(total as u64, "cards");
    let deck_key = checkpoint_key(&args.deck);
    let target_deck = args.target_deck.as_deref().unwrap_or(&args.deck);

    let mut summary = RunSummary::default();
    let mut completed_cards = Vec::with_capacity(total);

    for (chunk_index, chunk) in setup.cards.chunks(setup.batch_size).enumerate() {
        let chunk_start = chunk_index * setup.batch_size;
        if chunk_index > 0 && !setup.batch.delay().is_zero() {
            tokio::time::sleep(setup.batch.delay()).await;
        }

        let key = format!("{deck_key}@{}", chunk[0].position);
        let inputs: Vec<_> = chunk.iter().map(DeckCard::to_card_input).collect();
        let outcome = setup
            .batch
            .enrich_resumable(&key, &inputs, &setup.checkpoint, |done, _| {
                progress.set_position((chunk_start + done) as u64);
            })
            .await?;

        let completed = &outcome.cards[..outcome.completed];
        tally(&mut summary, chunk, &outcome.cards);
        summary.synced += sync_chunk(setup, args.sync, target_deck, chunk, completed).await?;
        progress.set_message(format!("{} synced", summary.synced));

        if outcome.stopped_early() {
            // The completed prefix is in Anki now; the next run starts after it.
            setup.checkpoint.clear(&key)?;
            summary.resume_offset = resume_position(chunk, outcome.completed);
            completed_cards.extend_from_slice(completed);
            break;
        }
        completed_cards.extend(outcome.cards);
    }

    progress.finish_with_message(format!("{} synced", summary.synced));
    Ok((summary, completed_cards))
}

fn tally(summary: &mut RunSummary, sources: &[DeckCard], cards: &[EnrichedCard]) {
    for (source, card) in sources.iter().zip(cards) {
        match card.outcome {
            Outcome::Enriched => summary.enriched += 1,
            Outcome::Failed => {
                summary.failed += 1;
                summary.failed_positions.push(source.position);
            }
            Outcome::RateLimited => summary.failed += 1,
            Outcome::Skipped => summary.skipped += 1,
        }
    }
}

/// Deck position to restart from after a chunk stopped at `completed`.
fn resume_position(sources: &[DeckCard], completed: usize) -> Option<usize> {
    sources.get(completed).map(|card| card.position)
}

/// Write the usable cards of a chunk back to Anki. Degraded cards are not
/// synced; their positions are reported in the run summary.
async fn sync_chunk(
    setup: &EnrichSetup,
    mode: SyncMode,
    target_deck: &str,
    sources: &[DeckCard],
    completed: &[EnrichedCard],
) -> anyhow::Result<usize> {
    match mode {
        SyncMode::None => Ok(0),
        SyncMode::NewNotes => {
            let notes = new_notes(sources, completed);
            if notes.is_empty() {
                return Ok(0);
            }
            let ids = setup.store.add_notes(target_deck, &notes).await?;
            Ok(ids.iter().flatten().count())
        }
        SyncMode::InPlace => {
            let mut synced = 0;
            for (source, card) in sources.iter().zip(completed) {
                if !card.is_enriched() {
                    continue;
                }
                match setup
                    .store
                    .update_note_fields(source.note_id, &render_in_place(card))
                    .await
                {
                    Ok(()) => synced += 1,
                    Err(e) => tracing::warn!("Failed to update note {}: {e}", source.note_id),
                }
            }
            Ok(synced)
        }
    }
}

fn new_notes(sources: &[DeckCard], completed: &[EnrichedCard]) -> Vec<NewNote> {
    let tags_by_id: HashMap<String, &[String]> = sources
        .iter()
        .map(|s| (s.note_id.to_string(), s.tags.as_slice()))
        .collect();

    completed
        .iter()
        .filter(|card| card.is_enriched())
        .map(|card| {
            let mut tags: Vec<String> = card
                .id
                .as_deref()
                .and_then(|id| tags_by_id.get(id))
                .map(|tags| tags.to_vec())
                .unwrap_or_default();
            tags.push(ENRICHED_TAG.to_string());
            NewNote {
                fields: render_note(card),
                tags,
            }
        })
        .collect()
}

/// Print a formatted summary table after a run.
pub(crate) fn print_summary(summary: &RunSummary, elapsed: Duration) {
    let processed = summary.enriched + summary.failed;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        processed as f64 / elapsed.as_secs_f64() * 60.0
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Enriched:     {:>8}", summary.enriched);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    if summary.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", summary.skipped);
    }
    eprintln!("    Synced:       {:>8}", summary.synced);
    eprintln!("  ------------------------------------");
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} cards/min", rate);
    eprintln!("  ====================================");
}
