//! The `cardforge priorities` command.

use cardforge_core::store::deck_cards;
use cardforge_core::{
    frequency_priorities, suggest_top_priorities, PriorityCard, PriorityMethod, PriorityReport,
    PrioritySuggestion,
};
use clap::Args;

use super::{AppContext, LlmArgs};

/// Arguments for the `priorities` command.
#[derive(Args, Debug)]
pub struct PrioritiesArgs {
    /// Deck name
    #[arg(required = true)]
    pub deck: String,

    /// Number of topics (1-50, defaults to priorities.top_n from config)
    #[arg(short = 'n', long)]
    pub top: Option<usize>,

    /// Maximum cards read from the deck
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Rank by shared vocabulary instead of asking an LLM
    #[arg(long)]
    pub frequency: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub llm: LlmArgs,
}

/// Execute the priorities command.
pub async fn execute(ctx: &AppContext, args: PrioritiesArgs) -> anyhow::Result<()> {
    let top_n = args.top.unwrap_or(ctx.config.priorities.top_n);
    let limit = args.limit.unwrap_or(ctx.config.priorities.limit);

    let store = ctx.store().await?;
    let cards: Vec<PriorityCard> = deck_cards(&store, &args.deck, false)
        .await?
        .iter()
        .take(limit)
        .map(|c| c.to_priority_card())
        .collect();
    if cards.is_empty() {
        anyhow::bail!("Deck {:?} has no cards", args.deck);
    }
    tracing::info!("Analyzing {} card(s) from {:?}", cards.len(), args.deck);

    let report = if args.frequency {
        PriorityReport {
            priorities: frequency_priorities(&cards, top_n),
            method: PriorityMethod::Fallback,
            error: None,
        }
    } else {
        let chain = ctx.chain(&args.llm.overrides());
        suggest_top_priorities(&cards, top_n, chain.as_ref()).await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for suggestion in &report.priorities {
            println!("{}", format_suggestion(suggestion));
        }
    }

    if let Some(error) = &report.error {
        anyhow::bail!("{error}\n\n  Hint: Use --frequency to rank by shared vocabulary without an LLM.");
    }
    Ok(())
}

fn format_suggestion(s: &PrioritySuggestion) -> String {
    let mut out = format!("{:>2}. {}\n    {}\n    Karte {}: {}", s.rank, s.topic, s.reason, s.id, s.front);
    for goal in s.learning_goals.iter().flatten() {
        out.push_str(&format!("\n    - {goal}"));
    }
    out
}
