//! Retry policy for transient E-utilities failures
//!
//! Every gateway call is wrapped by [`with_retry`], which re-runs the operation
//! on a capped exponential schedule while the error reports itself as
//! retryable. Exhaustion simply returns the last error to the caller.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_retry::RetryIf;
use tokio_retry::strategy::jitter;
use tracing::{debug, warn};

/// Classification hook for errors that may succeed on a later attempt
pub trait RetryableError {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Short human readable reason, used in retry logs
    fn retry_reason(&self) -> &str;
}

/// Backoff schedule and attempt cap for a single gateway call
///
/// The delay before retry `n` (1-based) is `initial_delay * 2^(n-1)`, clamped
/// into `[min_delay, max_delay]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Randomize each delay within `[0, delay]`
    pub jitter: bool,
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Materialize the delay schedule, one entry per retry
    pub fn delays(&self) -> Vec<Duration> {
        let ceiling = self.max_delay.max(self.min_delay);

        (0..self.max_retries)
            .map(|n| self.initial_delay.saturating_mul(2u32.saturating_pow(n)))
            .map(|delay| delay.clamp(self.min_delay, ceiling))
            .map(|delay| if self.jitter { jitter(delay) } else { delay })
            .collect()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_secs(1),
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            jitter: false,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the schedule runs out
///
/// `label` names the operation in log lines.
pub async fn with_retry<T, E, F, Fut>(operation: F, config: &RetryConfig, label: &str) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = AtomicU32::new(0);
    let max_attempts = config.max_attempts();
    let mut operation = operation;

    let result = RetryIf::start(
        config.delays(),
        || {
            attempts.fetch_add(1, Ordering::Relaxed);
            operation()
        },
        |err: &E| {
            let attempt = attempts.load(Ordering::Relaxed);
            if !err.is_retryable() {
                debug!(attempt, reason = err.retry_reason(), "{} failed permanently", label);
                return false;
            }
            if attempt < max_attempts {
                warn!(
                    attempt,
                    max_attempts,
                    reason = err.retry_reason(),
                    error = %err,
                    "{} failed, retrying",
                    label
                );
            }
            true
        },
    )
    .await;

    if let Err(err) = &result {
        let attempt = attempts.load(Ordering::Relaxed);
        if err.is_retryable() && attempt >= max_attempts {
            warn!(attempts = attempt, error = %err, "{} exhausted retries", label);
        }
    }

    result
}
