//! Retry utilities for transient LLM failures.
//!
//! Provides classification of retryable errors and exponential backoff.

use crate::error::LlmError;
use std::time::Duration;

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Determine whether an LLM error is worth retrying on the same provider.
///
/// Retryable: rate limits (429), server errors (5xx), timeouts, empty
/// responses, transport failures. Non-retryable: auth failures and other
/// rejected requests.
pub fn is_retryable(error: &LlmError) -> bool {
    match error {
        LlmError::RateLimit { .. }
        | LlmError::Server { .. }
        | LlmError::Timeout { .. }
        | LlmError::EmptyResponse { .. }
        | LlmError::Network { .. } => true,
        LlmError::Auth { .. } | LlmError::BadRequest { .. } | LlmError::Exhausted { .. } => false,
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}

/// Retry settings applied to every provider in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (so `max_retries + 1` calls at most)
    pub max_retries: u32,
    /// Base delay doubled on each retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Sleep before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_duration(attempt, self.base_delay.as_millis() as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> String {
        "gemini".to_string()
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = LlmError::Timeout {
            provider: p(),
            timeout_ms: 60000,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = LlmError::RateLimit {
            provider: p(),
            message: "quota".to_string(),
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_server_error_is_retryable() {
        let err = LlmError::Server {
            provider: p(),
            status: 503,
            message: "service unavailable".to_string(),
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_empty_and_network_are_retryable() {
        assert!(is_retryable(&LlmError::EmptyResponse { provider: p() }));
        assert!(is_retryable(&LlmError::Network {
            provider: p(),
            message: "connection refused".to_string(),
        }));
    }

    #[test]
    fn test_auth_error_not_retryable() {
        let err = LlmError::Auth {
            provider: p(),
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_bad_request_not_retryable() {
        let err = LlmError::BadRequest {
            provider: p(),
            status: 400,
            message: "model not found".to_string(),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_backoff_exponential() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(1, 1000), Duration::from_millis(2000));
        assert_eq!(backoff_duration(2, 1000), Duration::from_millis(4000));
        assert_eq!(backoff_duration(3, 1000), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_capped_at_30s() {
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
        assert_eq!(backoff_duration(u32::MAX, 2000), Duration::from_millis(30_000));
    }

    #[test]
    fn test_policy_delay_uses_base() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        };
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
    }
}
