//! Retry policy with exponential backoff

use std::time::Duration;

use thiserror::Error;

use crate::core::RetryConfig;
use crate::core::constants::{DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS};

/// Classification of a failed attempt.
///
/// Everything is retryable unless the error type says otherwise.
pub trait Retryable {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Fixed attempt budget with `base_delay * 2^attempt_index` backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        )
    }
}

impl RetryPolicy {
    /// A zero budget is clamped to a single attempt.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Backoff before the retry that follows the zero-based `attempt_index`
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether another attempt may follow the given 1-based attempt number
    pub fn has_budget_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay)
    }
}

/// Terminal failure of a guarded operation
#[derive(Error, Debug)]
pub enum AttemptError<E> {
    /// Every attempt in the budget failed; carries the last error
    #[error("failed after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },

    /// A non-retryable error aborted the loop immediately
    #[error("fatal error on attempt {attempt}: {source}")]
    Fatal { attempt: u32, source: E },
}

impl<E> AttemptError<E> {
    /// Number of attempts consumed
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Fatal { attempt, .. } => *attempt,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::Fatal { source, .. } => source,
        }
    }
}
