//! Provider configuration resolution.
//!
//! Turns per-run overrides, the environment snapshot, and the config file into
//! an ordered, validated list of [`ProviderConfig`]s plus the call policy.
//! Per-field precedence: override, provider-specific variable, generic
//! variable, hard-coded default.

use super::provider::{ProviderConfig, ProviderKind};
use super::retry::RetryPolicy;
use crate::config::{Environment, LlmConfig};
use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Per-run overrides, typically from a request body or CLI flags.
///
/// `model`, `api_key` and `base_url` apply to the primary provider only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub fallback_providers: Option<Vec<String>>,
}

/// Everything needed to build a fallback chain.
#[derive(Debug, Clone)]
pub struct ResolvedLlm {
    /// Primary first, then usable fallbacks; deduplicated by kind
    pub providers: Vec<ProviderConfig>,
    pub retry: RetryPolicy,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl ResolvedLlm {
    pub fn primary(&self) -> &ProviderConfig {
        // `resolve_providers` never returns an empty list
        &self.providers[0]
    }
}

/// Resolve the provider chain and call policy.
///
/// Fails only when the primary provider is unknown or unusable; fallbacks
/// that cannot be configured are dropped.
pub fn resolve_providers(
    overrides: &LlmOverrides,
    env: &Environment,
    config: &LlmConfig,
) -> Result<ResolvedLlm, ConfigError> {
    let primary_name = non_blank(overrides.provider.as_deref())
        .or_else(|| env.get("LLM_PROVIDER"))
        .or_else(|| non_blank(Some(config.provider.as_str())))
        .unwrap_or("gemini");
    let primary_kind = ProviderKind::parse(primary_name)?;
    let primary = resolve_one(primary_kind, Some(overrides), env)?;

    let fallback_kinds = match &overrides.fallback_providers {
        Some(names) if !names.is_empty() => parse_names(names)?,
        _ => match env.get("LLM_FALLBACK_PROVIDERS") {
            Some(list) => ProviderKind::parse_list(list)?,
            None => parse_names(&config.fallback_providers)?,
        },
    };

    let mut providers = vec![primary];
    for kind in fallback_kinds {
        if providers.iter().any(|p| p.kind == kind) {
            continue;
        }
        match resolve_one(kind, None, env) {
            Ok(provider) => providers.push(provider),
            Err(e) => tracing::debug!("Skipping fallback provider {kind}: {e}"),
        }
    }

    let max_retries = env
        .number("LLM_MAX_RETRIES")
        .map(|n| n.min(u32::MAX as u64) as u32)
        .unwrap_or(config.max_retries);
    let timeout = env
        .millis("LLM_TIMEOUT_MS")
        .filter(|d| !d.is_zero())
        .unwrap_or(Duration::from_millis(config.timeout_ms));

    tracing::debug!(
        "Resolved LLM chain: {} (max_retries={max_retries}, timeout={}ms)",
        providers
            .iter()
            .map(|p| format!("{}:{}", p.kind, p.model))
            .collect::<Vec<_>>()
            .join(" -> "),
        timeout.as_millis()
    );

    Ok(ResolvedLlm {
        providers,
        retry: RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(config.retry_delay_ms),
        },
        timeout,
    })
}

fn resolve_one(
    kind: ProviderKind,
    overrides: Option<&LlmOverrides>,
    env: &Environment,
) -> Result<ProviderConfig, ConfigError> {
    let api_key = overrides
        .and_then(|o| non_blank(o.api_key.as_deref()))
        .or_else(|| env.first_of(&[kind.key_var(), "LLM_API_KEY"]))
        .ok_or_else(|| ConfigError::MissingCredential {
            provider: kind.to_string(),
            hint: "GEMINI_API_KEY, OPENAI_API_KEY, TOGETHER_API_KEY, or LLM_API_KEY".to_string(),
        })?
        .to_string();

    let model = overrides
        .and_then(|o| non_blank(o.model.as_deref()))
        .or_else(|| kind.model_var().and_then(|var| env.get(var)))
        .or_else(|| env.get("LLM_MODEL"))
        .unwrap_or(kind.default_model())
        .to_string();

    let base_url = overrides
        .and_then(|o| non_blank(o.base_url.as_deref()))
        .or_else(|| kind.base_url_var().and_then(|var| env.get(var)))
        .or_else(|| {
            kind.accepts_generic_base_url()
                .then(|| env.get("LLM_BASE_URL"))
                .flatten()
        })
        .or(kind.default_base_url())
        .map(|url| url.trim_end_matches('/').to_string());

    if base_url.is_none() {
        return Err(ConfigError::MissingBaseUrl {
            provider: kind.to_string(),
        });
    }

    Ok(ProviderConfig {
        kind,
        api_key,
        model,
        base_url,
    })
}

fn parse_names(names: &[String]) -> Result<Vec<ProviderKind>, ConfigError> {
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(ProviderKind::parse)
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        Environment::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_defaults_to_gemini() {
        let resolved = resolve_providers(
            &LlmOverrides::default(),
            &env(&[("GEMINI_API_KEY", "g")]),
            &LlmConfig::default(),
        )
        .unwrap();
        let primary = resolved.primary();
        assert_eq!(primary.kind, ProviderKind::Gemini);
        assert_eq!(primary.model, "gemini-2.5-flash");
        assert_eq!(
            primary.base_url.as_deref(),
            Some("https://generativelanguage.googleapis.com")
        );
        assert_eq!(resolved.retry.max_retries, 3);
        assert_eq!(resolved.timeout, Duration::from_millis(120_000));
    }

    #[test]
    fn test_missing_primary_key_is_fatal() {
        let err = resolve_providers(
            &LlmOverrides::default(),
            &Environment::default(),
            &LlmConfig::default(),
        )
        .unwrap_err();
        match err {
            ConfigError::MissingCredential { provider, hint } => {
                assert_eq!(provider, "gemini");
                assert!(hint.contains("LLM_API_KEY"));
            }
            other => panic!("expected MissingCredential, got {other:?}"),
        }
    }

    #[test]
    fn test_override_beats_env() {
        let overrides = LlmOverrides {
            provider: Some("openai".into()),
            model: Some("gpt-4.1".into()),
            api_key: Some("override-key".into()),
            ..Default::default()
        };
        let resolved = resolve_providers(
            &overrides,
            &env(&[
                ("LLM_PROVIDER", "together"),
                ("OPENAI_API_KEY", "env-key"),
                ("OPENAI_MODEL", "gpt-4o"),
            ]),
            &LlmConfig::default(),
        )
        .unwrap();
        let primary = resolved.primary();
        assert_eq!(primary.kind, ProviderKind::OpenAi);
        assert_eq!(primary.api_key, "override-key");
        assert_eq!(primary.model, "gpt-4.1");
    }

    #[test]
    fn test_specific_env_beats_generic_env() {
        let resolved = resolve_providers(
            &LlmOverrides::default(),
            &env(&[
                ("LLM_PROVIDER", "together"),
                ("TOGETHER_API_KEY", "t-key"),
                ("LLM_API_KEY", "generic"),
                ("LLM_MODEL", "generic-model"),
                ("TOGETHER_BASE_URL", "https://proxy.test/"),
                ("LLM_BASE_URL", "https://generic.test"),
            ]),
            &LlmConfig::default(),
        )
        .unwrap();
        let primary = resolved.primary();
        assert_eq!(primary.api_key, "t-key");
        assert_eq!(primary.model, "generic-model");
        assert_eq!(primary.base_url.as_deref(), Some("https://proxy.test"));
    }

    #[test]
    fn test_generic_base_url_never_applies_to_gemini() {
        let resolved = resolve_providers(
            &LlmOverrides::default(),
            &env(&[("LLM_API_KEY", "k"), ("LLM_BASE_URL", "https://chat.test")]),
            &LlmConfig::default(),
        )
        .unwrap();
        assert_eq!(
            resolved.primary().base_url.as_deref(),
            Some("https://generativelanguage.googleapis.com")
        );
    }

    #[test]
    fn test_generic_kind_requires_base_url() {
        let err = resolve_providers(
            &LlmOverrides {
                provider: Some("openai-compatible".into()),
                ..Default::default()
            },
            &env(&[("OPENAI_API_KEY", "k")]),
            &LlmConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingBaseUrl { .. }));

        let resolved = resolve_providers(
            &LlmOverrides {
                provider: Some("openai-compatible".into()),
                ..Default::default()
            },
            &env(&[("OPENAI_API_KEY", "k"), ("LLM_BASE_URL", "http://localhost:11434/")]),
            &LlmConfig::default(),
        )
        .unwrap();
        assert_eq!(
            resolved.primary().base_url.as_deref(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn test_unusable_fallbacks_are_dropped_and_duplicates_removed() {
        let resolved = resolve_providers(
            &LlmOverrides::default(),
            &env(&[
                ("GEMINI_API_KEY", "g"),
                ("TOGETHER_API_KEY", "t"),
                ("LLM_FALLBACK_PROVIDERS", "gemini, openai-compatible, together, together"),
            ]),
            &LlmConfig::default(),
        )
        .unwrap();
        let kinds: Vec<_> = resolved.providers.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProviderKind::Gemini, ProviderKind::Together]);
    }

    #[test]
    fn test_overrides_apply_to_primary_only() {
        let overrides = LlmOverrides {
            provider: Some("openai".into()),
            api_key: Some("only-primary".into()),
            model: Some("gpt-4.1".into()),
            fallback_providers: Some(vec!["together".into()]),
            ..Default::default()
        };
        let resolved = resolve_providers(
            &overrides,
            &env(&[("TOGETHER_API_KEY", "t")]),
            &LlmConfig::default(),
        )
        .unwrap();
        let fallback = &resolved.providers[1];
        assert_eq!(fallback.kind, ProviderKind::Together);
        assert_eq!(fallback.api_key, "t");
        assert_eq!(fallback.model, "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo");
    }

    #[test]
    fn test_fallback_list_from_config_file() {
        let config = LlmConfig {
            fallback_providers: vec!["openai".into()],
            ..Default::default()
        };
        let resolved = resolve_providers(
            &LlmOverrides::default(),
            &env(&[("LLM_API_KEY", "shared")]),
            &config,
        )
        .unwrap();
        assert_eq!(resolved.providers.len(), 2);
        assert_eq!(resolved.providers[1].base_url.as_deref(), Some("https://api.openai.com"));
    }

    #[test]
    fn test_policy_from_env() {
        let resolved = resolve_providers(
            &LlmOverrides::default(),
            &env(&[
                ("GEMINI_API_KEY", "g"),
                ("LLM_MAX_RETRIES", "0"),
                ("LLM_TIMEOUT_MS", "5000"),
            ]),
            &LlmConfig::default(),
        )
        .unwrap();
        assert_eq!(resolved.retry.max_retries, 0);
        assert_eq!(resolved.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_unknown_primary_is_error() {
        let err = resolve_providers(
            &LlmOverrides::default(),
            &env(&[("LLM_PROVIDER", "claude"), ("LLM_API_KEY", "k")]),
            &LlmConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(_)));
    }
}
