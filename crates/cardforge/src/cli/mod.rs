//! Command implementations.

pub mod config;
pub mod decks;
pub mod enrich;
pub mod enrich_file;
pub mod priorities;

use cardforge_core::{
    resolve_providers, AnkiConnect, Config, ConfigError, Environment, FallbackChain, LlmOverrides,
};
use clap::Args;
use std::path::PathBuf;

/// State shared by every command: the loaded config and the environment
/// snapshot taken once at startup.
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub env: Environment,
}

impl AppContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            env: Environment::from_process(),
        }
    }

    /// Resolve the provider chain for this run.
    pub fn chain(&self, overrides: &LlmOverrides) -> Result<FallbackChain, ConfigError> {
        let resolved = resolve_providers(overrides, &self.env, &self.config.llm)?;
        FallbackChain::from_resolved(&resolved)
    }

    /// Connect to AnkiConnect and check that it answers.
    pub async fn store(&self) -> anyhow::Result<AnkiConnect> {
        let url = self.config.store_url(&self.env);
        let store = AnkiConnect::new(&url, &self.config.store.note_type)?;
        let version = store.version().await?;
        tracing::debug!("Connected to AnkiConnect v{version} at {url}");
        Ok(store)
    }
}

/// LLM selection flags shared by the commands that generate text.
#[derive(Args, Debug, Default, Clone)]
pub struct LlmArgs {
    /// LLM provider: gemini, openai, together, openai-compatible
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name for the primary provider
    #[arg(long)]
    pub model: Option<String>,

    /// API key for the primary provider (prefer the environment)
    #[arg(long)]
    pub api_key: Option<String>,

    /// API base URL for the primary provider
    #[arg(long)]
    pub base_url: Option<String>,

    /// Fallback providers, tried in order (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub fallback: Vec<String>,
}

impl LlmArgs {
    pub fn overrides(&self) -> LlmOverrides {
        LlmOverrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            fallback_providers: (!self.fallback.is_empty()).then(|| self.fallback.clone()),
        }
    }

    /// Fill unset fields from `other` (flags win over a request file).
    pub fn or(self, other: LlmOverrides) -> LlmOverrides {
        let own = self.overrides();
        LlmOverrides {
            provider: own.provider.or(other.provider),
            model: own.model.or(other.model),
            api_key: own.api_key.or(other.api_key),
            base_url: own.base_url.or(other.base_url),
            fallback_providers: own.fallback_providers.or(other.fallback_providers),
        }
    }
}

/// Progress bar in the house style.
pub(crate) fn create_progress_bar(total: u64, unit: &str) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let template = format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} {{msg}}"
    );
    if let Ok(style) = ProgressStyle::default_bar().template(&template) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}
