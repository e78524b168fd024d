//! Process environment snapshot.
//!
//! The environment is read exactly once, at process start, and passed by
//! reference to whatever needs it. No other module calls `std::env::var`.

use std::collections::HashMap;
use std::time::Duration;

/// Variables recognized by Cardforge.
pub const RECOGNIZED_VARS: &[&str] = &[
    "LLM_PROVIDER",
    "LLM_FALLBACK_PROVIDERS",
    "LLM_API_KEY",
    "LLM_MODEL",
    "LLM_BASE_URL",
    "LLM_MAX_RETRIES",
    "LLM_TIMEOUT_MS",
    "LLM_REQUEST_DELAY_MS",
    "GEMINI_API_KEY",
    "GEMINI_MODEL",
    "GEMINI_BASE_URL",
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
    "OPENAI_BASE_URL",
    "TOGETHER_API_KEY",
    "TOGETHER_MODEL",
    "TOGETHER_BASE_URL",
    "ANKICONNECT_URL",
];

/// Immutable snapshot of the recognized environment variables.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the recognized variables from the current process.
    pub fn from_process() -> Self {
        Self::from_pairs(
            RECOGNIZED_VARS
                .iter()
                .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v))),
        )
    }

    /// Build from explicit pairs (tests, embedding applications).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a variable. Blank values count as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First set variable among `names`.
    pub fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Parse a numeric variable; unparseable values are ignored with a warning.
    pub fn number(&self, name: &str) -> Option<u64> {
        let raw = self.get(name)?;
        match raw.parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::warn!("Ignoring {name}={raw:?}: not a non-negative integer");
                None
            }
        }
    }

    /// Parse a millisecond duration variable.
    pub fn millis(&self, name: &str) -> Option<Duration> {
        self.number(name).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_unset() {
        let env = Environment::from_pairs([("GEMINI_API_KEY", "  "), ("LLM_API_KEY", "k")]);
        assert_eq!(env.get("GEMINI_API_KEY"), None);
        assert_eq!(env.first_of(&["GEMINI_API_KEY", "LLM_API_KEY"]), Some("k"));
    }

    #[test]
    fn number_ignores_garbage() {
        let env = Environment::from_pairs([("LLM_MAX_RETRIES", "lots"), ("LLM_TIMEOUT_MS", "5000")]);
        assert_eq!(env.number("LLM_MAX_RETRIES"), None);
        assert_eq!(env.millis("LLM_TIMEOUT_MS"), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn values_are_trimmed() {
        let env = Environment::from_pairs([("LLM_PROVIDER", " openai \n")]);
        assert_eq!(env.get("LLM_PROVIDER"), Some("openai"));
    }
}
