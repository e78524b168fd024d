//! Configuration management for Cardforge.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. All config structs implement `Default`. Environment variables are
//! captured separately in [`Environment`] and layered on top by the resolvers.

mod env;
mod types;
mod validate;

pub use env::{Environment, RECOGNIZED_VARS};
pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure for Cardforge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider settings
    pub llm: LlmConfig,

    /// Flashcard store settings
    pub store: StoreConfig,

    /// Batch enrichment settings
    pub batch: BatchConfig,

    /// Priority summarizer settings
    pub priorities: PrioritiesConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.cardforge.cardforge/config.toml
    /// - Linux: ~/.config/cardforge/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\cardforge\config\config.toml
    ///
    /// Falls back to ~/.cardforge/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "cardforge", "cardforge")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = shellexpand::tilde("~").into_owned();
                PathBuf::from(home).join(".cardforge").join("config.toml")
            })
    }

    /// Get the resolved checkpoint file path (with ~ expansion).
    pub fn checkpoint_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.batch.checkpoint_file);
        PathBuf::from(expanded.into_owned())
    }

    /// AnkiConnect URL: `ANKICONNECT_URL` wins over the config file.
    pub fn store_url(&self, env: &Environment) -> String {
        env.get("ANKICONNECT_URL")
            .map(String::from)
            .unwrap_or_else(|| self.store.url.clone())
    }

    /// Inter-card pacing: `LLM_REQUEST_DELAY_MS` wins over the config file.
    pub fn request_delay(&self, env: &Environment) -> Duration {
        env.millis("LLM_REQUEST_DELAY_MS")
            .unwrap_or(Duration::from_millis(self.llm.request_delay_ms))
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.batch.batch_size, 5);
        assert_eq!(config.priorities.top_n, 15);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[llm]"));
        assert!(toml.contains("[store]"));
        assert!(toml.contains("[batch]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\nprovider = \"openai\"\nmax_retries = 1\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.max_retries, 1);
        assert_eq!(config.llm.timeout_ms, 120_000);
        assert_eq!(config.store.url, "http://localhost:8765");
    }

    #[test]
    fn test_env_overrides_request_delay_and_store_url() {
        let config = Config::default();
        let env = Environment::from_pairs([
            ("LLM_REQUEST_DELAY_MS", "14000"),
            ("ANKICONNECT_URL", "http://127.0.0.1:9999"),
        ]);
        assert_eq!(config.request_delay(&env), Duration::from_millis(14_000));
        assert_eq!(config.store_url(&env), "http://127.0.0.1:9999");

        let empty = Environment::default();
        assert_eq!(config.request_delay(&empty), Duration::from_millis(500));
    }

    #[test]
    fn test_checkpoint_path_is_expanded() {
        let config = Config::default();
        assert!(!config.checkpoint_path().to_string_lossy().starts_with('~'));
    }
}
