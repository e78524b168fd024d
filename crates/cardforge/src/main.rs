//! Cardforge CLI - enrich Anki flashcards with AI-generated explanations.
//!
//! Cardforge reads cards from Anki (through AnkiConnect) or a JSON file, asks
//! an LLM for a solution, explanation, grading table and mnemonic per card,
//! and writes the results back.
//!
//! # Usage
//!
//! ```bash
//! # List decks
//! cardforge decks
//!
//! # Enrich a deck, 5 cards per chunk, resuming where the last run stopped
//! cardforge enrich "Klinik::Kardiologie" --limit 50
//!
//! # Enrich cards from a JSON request file
//! cardforge enrich-file request.json --output enriched.json
//!
//! # Suggest study priorities
//! cardforge priorities "Klinik::Kardiologie" --top 10
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Cardforge - enrich flashcards with AI-generated explanations.
#[derive(Parser, Debug)]
#[command(name = "cardforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List the decks available in Anki
    Decks(cli::decks::DecksArgs),

    /// Enrich the cards of an Anki deck and sync the results back
    Enrich(cli::enrich::EnrichArgs),

    /// Enrich cards from a JSON request file
    EnrichFile(cli::enrich_file::EnrichFileArgs),

    /// Suggest the most important study topics of a deck
    Priorities(cli::priorities::PrioritiesArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(cardforge_core::Config::default_path);
    let config = match &cli.config {
        // An explicit path must load
        Some(path) => cardforge_core::Config::load_from(path)?,
        None => match cardforge_core::Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `cardforge config path`."
                );
                cardforge_core::Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Cardforge v{}", cardforge_core::VERSION);

    let ctx = cli::AppContext::new(config, config_path);

    match cli.command {
        Commands::Decks(args) => cli::decks::execute(&ctx, args).await,
        Commands::Enrich(args) => cli::enrich::execute(&ctx, args).await,
        Commands::EnrichFile(args) => cli::enrich_file::execute(&ctx, args).await,
        Commands::Priorities(args) => cli::priorities::execute(&ctx, args).await,
        Commands::Config(args) => cli::config::execute(&ctx, args).await,
    }
}
