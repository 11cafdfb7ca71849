//! Retry policy for failed attempts
//!
//! # Decision Table
//!
//! | Outcome | Default action |
//! |---------|----------------|
//! | Success (any status) | Stop |
//! | Timeout | Retry while attempts < max, exponential backoff |
//! | ConnectionError | Retry while attempts < max, exponential backoff |
//! | TooManyRedirects | Stop |
//! | InvalidUrl | Stop, never retried regardless of configuration |
//! | Cancelled | Stop, never retried regardless of configuration |

use crate::config::RetryConfig;
use crate::engine::model::{Outcome, OutcomeKind};
use std::collections::HashSet;
use std::time::Duration;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),

    /// `base * 2^attempt_index`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Returns the delay to wait after attempt `attempt_index` (zero-based)
    pub fn delay(&self, attempt_index: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base, max } => {
                let factor = 1u32.checked_shl(attempt_index).unwrap_or(u32::MAX);
                base.checked_mul(factor).unwrap_or(max).min(max)
            }
        }
    }
}

/// What the pipeline should do after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then issue the next attempt
    Retry(Duration),
    /// Emit the result with the latest outcome
    Stop,
}

/// Decides whether a failed attempt should be retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    retry_on: HashSet<OutcomeKind>,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least one
    pub fn new(
        max_attempts: u32,
        retry_on: impl IntoIterator<Item = OutcomeKind>,
        backoff: Backoff,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_on: retry_on.into_iter().collect(),
            backoff,
        }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self::new(1, [], Backoff::Fixed(Duration::ZERO))
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.retry_on.iter().copied(),
            Backoff::Exponential {
                base: Duration::from_millis(config.backoff_base_ms),
                max: Duration::from_millis(config.backoff_max_ms),
            },
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Returns true if outcomes of this kind may be retried at all
    pub fn is_retryable(&self, kind: OutcomeKind) -> bool {
        !matches!(kind, OutcomeKind::InvalidUrl | OutcomeKind::Cancelled)
            && self.retry_on.contains(&kind)
    }

    /// Decides what happens after an attempt
    ///
    /// # Arguments
    ///
    /// * `attempts_made` - Attempts completed so far, including the latest
    /// * `outcome` - The latest attempt's outcome
    pub fn decide(&self, attempts_made: u32, outcome: &Outcome) -> RetryDecision {
        if attempts_made < self.max_attempts && self.is_retryable(outcome.kind()) {
            RetryDecision::Retry(self.backoff.delay(attempts_made.saturating_sub(1)))
        } else {
            RetryDecision::Stop
        }
    }
}
