//! The `cardforge enrich` command for enriching an Anki deck.

mod batch;
mod setup;
pub mod types;

pub use types::SyncMode;

use super::{AppContext, LlmArgs};
use clap::Args;
use std::path::PathBuf;

use batch::{print_summary, run_chunks};
use setup::setup_enrichment;

/// Arguments for the `enrich` command.
#[derive(Args, Debug)]
pub struct EnrichArgs {
    /// Source deck name
    #[arg(required = true)]
    pub deck: String,

    /// Maximum cards to enrich (defaults to batch.limit from config)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Position in the deck to start at (counts every note, including
    /// ones left out by --skip-enriched)
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Cards per chunk; each chunk is synced before the next starts
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Pause between cards in milliseconds (overrides LLM_REQUEST_DELAY_MS)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// How results are written back to Anki
    #[arg(long, value_enum, default_value_t = SyncMode::NewNotes)]
    pub sync: SyncMode,

    /// Deck that receives new notes (defaults to the source deck)
    #[arg(long)]
    pub target_deck: Option<String>,

    /// Skip notes that already carry an in-place enrichment
    #[arg(long)]
    pub skip_enriched: bool,

    /// Progress file (defaults to batch.checkpoint_file from config)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Also write the enriched cards as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub llm: LlmArgs,
}

/// Execute the enrich command.
pub async fn execute(ctx: &AppContext, args: EnrichArgs) -> anyhow::Result<()> {
    let setup = setup_enrichment(ctx, &args).await?;
    if setup.cards.is_empty() {
        tracing::warn!("No cards to enrich in {:?}", args.deck);
        return Ok(());
    }
    tracing::info!(
        "Enriching {} card(s) from {:?} via {}",
        setup.cards.len(),
        args.deck,
        setup.providers.join(" -> ")
    );

    let start = std::time::Instant::now();
    let (summary, enriched) = run_chunks(&setup, &args).await?;

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&serde_json::json!({ "enriched": enriched }))?;
        std::fs::write(path, json)?;
        tracing::info!("Output written to {:?}", path);
    }

    print_summary(&summary, start.elapsed());
    if let Some(offset) = summary.resume_offset {
        eprintln!(
            "\n  Rate limit reached. Resume later with:\n    cardforge enrich {:?} --offset {offset}{}",
            args.deck,
            if args.skip_enriched { " --skip-enriched" } else { "" }
        );
    }
    if let Some(hint) = failed_hint(&summary.failed_positions) {
        eprintln!("\n{hint}");
    }
    Ok(())
}

/// Where the cards that failed generation sit, so they can be retried.
fn failed_hint(positions: &[usize]) -> Option<String> {
    let first = positions.first()?;
    let listed: Vec<String> = positions.iter().map(usize::to_string).collect();
    Some(format!(
        "  {} card(s) failed and were not synced (deck positions {}).\n  \
         Retry them with --offset {first} --limit 1 per position.",
        positions.len(),
        listed.join(", ")
    ))
}
