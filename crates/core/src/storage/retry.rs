//! Retry policy: bounded exponential backoff and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Both the writer and the
//! query router retry only [`StoreError`]s classified as transient.

use std::time::Duration;

use backon::ExponentialBuilder;

use super::StoreError;

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    /// - Min delay: 20ms
    /// - Max delay: 1s
    /// - Max retries: 5
    /// - Jitter enabled
    fn default() -> Self {
        Self {
            max_retries: 5,
            min_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(1),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Builds the `backon` backoff for this policy.
    pub fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// Determines if a store error is worth retrying.
///
/// Retryable:
/// - `Transient`: throttling, timeouts, dropped connections
/// - `TransactionCanceled` whose every cause is transient (transaction
///   conflicts, throttled items)
///
/// Everything else, including any precondition failure, is surfaced on
/// first occurrence.
pub fn is_retryable(error: &StoreError) -> bool {
    error.is_transient()
}
