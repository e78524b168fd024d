//! The `cardforge decks` command.

use super::AppContext;
use cardforge_core::NoteStore;
use clap::Args;

/// Arguments for the `decks` command.
#[derive(Args, Debug)]
pub struct DecksArgs {
    /// Print the deck list as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the decks command.
pub async fn execute(ctx: &AppContext, args: DecksArgs) -> anyhow::Result<()> {
    let store = ctx.store().await?;
    let mut decks = store.list_decks().await?;
    decks.sort();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decks)?);
    } else {
        for deck in &decks {
            println!("{deck}");
        }
    }
    tracing::info!("{} deck(s)", decks.len());
    Ok(())
}
