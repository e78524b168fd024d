//! The `cardforge enrich-file` command: enrich cards from a JSON request.
//!
//! The request file looks like
//! `{"cards": [{"front", "back", "options"?, "answers"?}], "provider"?,
//! "model"?, "apiKey"?, "baseUrl"?, "fallbackProviders"?, "requestDelayMs"?}`.
//! The response is `{"enriched": [...]}`, or a chunk response
//! `{"enriched", "nextOffset", "total", "hasMore"}` when `--offset` or
//! `--limit` is given.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cardforge_core::{BatchEnricher, CardInput, ChunkRequest, LlmOverrides};
use clap::Args;
use serde::Deserialize;

use super::{create_progress_bar, AppContext, LlmArgs};

/// Arguments for the `enrich-file` command.
#[derive(Args, Debug)]
pub struct EnrichFileArgs {
    /// JSON request file ("-" for stdin)
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Process only the chunk starting here
    #[arg(long)]
    pub offset: Option<usize>,

    /// Chunk size when processing a single chunk
    #[arg(short, long)]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub llm: LlmArgs,
}

/// Inbound enrichment request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichFileRequest {
    #[serde(default)]
    pub cards: Vec<CardInput>,
    #[serde(flatten)]
    pub overrides: LlmOverrides,
    pub request_delay_ms: Option<u64>,
}

impl EnrichFileRequest {
    fn parse(json: &str) -> anyhow::Result<Self> {
        let request: Self = serde_json::from_str(json)?;
        if request.cards.is_empty() {
            anyhow::bail!("Request contains no cards. Expected {{\"cards\": [{{\"front\": ..., \"back\": ...}}]}}");
        }
        Ok(request)
    }
}

/// Execute the enrich-file command.
pub async fn execute(ctx: &AppContext, args: EnrichFileArgs) -> anyhow::Result<()> {
    let json = if args.input.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        if !args.input.exists() {
            anyhow::bail!(
                "Input file does not exist: {:?}\n\n  Hint: Check the file path and try again.",
                args.input
            );
        }
        std::fs::read_to_string(&args.input)?
    };
    let request = EnrichFileRequest::parse(&json)?;

    let overrides = args.llm.clone().or(request.overrides.clone());
    let chain = ctx.chain(&overrides)?;
    tracing::info!(
        "Enriching {} card(s) via {}",
        request.cards.len(),
        chain.provider_names().join(" -> ")
    );

    let delay = request
        .request_delay_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| ctx.config.request_delay(&ctx.env));
    let batch = BatchEnricher::new(Arc::new(chain), delay);

    let response = if args.offset.is_some() || args.limit.is_some() {
        let chunk = ChunkRequest {
            offset: args.offset.unwrap_or(0),
            batch_size: args.limit.unwrap_or(ctx.config.batch.batch_size),
        };
        let response = batch.enrich_chunk(&request.cards, chunk).await;
        if response.has_more {
            tracing::info!("Next chunk starts at offset {}", response.next_offset);
        }
        serde_json::to_value(&response)?
    } else {
        let progress = create_progress_bar(request.cards.len() as u64, "cards");
        let outcome = batch
            .enrich_many(&request.cards, |done, _| progress.set_position(done as u64))
            .await;
        progress.finish_with_message(format!("{} enriched", outcome.enriched_count()));
        if outcome.stopped_early() {
            tracing::warn!(
                "Rate limit reached after {} card(s); the rest were skipped",
                outcome.completed
            );
        }
        serde_json::json!({ "enriched": outcome.cards })
    };

    let json = serde_json::to_string_pretty(&response)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("Output written to {:?}", path);
        }
        None => println!("{json}"),
    }
    Ok(())
}
