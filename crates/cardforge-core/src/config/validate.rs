//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::llm::ProviderKind;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        ProviderKind::parse(&self.llm.provider)?;
        for name in &self.llm.fallback_providers {
            ProviderKind::parse(name)?;
        }
        if self.llm.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_ms must be > 0".into(),
            ));
        }
        if self.llm.max_retries > 10 {
            return Err(ConfigError::ValidationError(
                "llm.max_retries must be <= 10".into(),
            ));
        }
        if self.batch.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch.batch_size must be > 0".into(),
            ));
        }
        if self.batch.limit == 0 {
            return Err(ConfigError::ValidationError(
                "batch.limit must be > 0".into(),
            ));
        }
        if self.priorities.top_n == 0 || self.priorities.top_n > 50 {
            return Err(ConfigError::ValidationError(
                "priorities.top_n must be between 1 and 50".into(),
            ));
        }
        if self.priorities.limit == 0 {
            return Err(ConfigError::ValidationError(
                "priorities.limit must be > 0".into(),
            ));
        }
        Ok(())
    }
}
