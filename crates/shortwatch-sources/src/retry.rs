//! Bounded retry with exponential backoff and jitter.

use crate::error::{Result, SourceError};
use rand::Rng;
use shortwatch_core::HttpConfig;
use std::future::Future;
use std::time::Duration;

/// Default number of attempts (including the first).
pub const MAX_RETRIES: u32 = 3;

/// Base delay in milliseconds for retry backoff.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Rate limit backoff multiplier (longer wait for rate limits).
pub const RATE_LIMIT_BACKOFF_MULTIPLIER: u64 = 3;

/// How often and how patiently to retry transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further one
    pub base_delay: Duration,
    /// Cap for the exponential part of the delay
    pub max_delay: Duration,
    /// Lower bound of random jitter added to each delay
    pub jitter_min: Duration,
    /// Upper bound of random jitter added to each delay
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: Duration::from_millis(RETRY_DELAY_MS),
            max_delay: Duration::from_millis(8000),
            jitter_min: Duration::from_millis(1000),
            jitter_max: Duration::from_millis(3000),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from HTTP configuration.
    #[must_use]
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            jitter_min: Duration::from_millis(config.jitter_min_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms.max(config.jitter_min_ms)),
        }
    }

    /// A policy that retries immediately; used by tests and dry runs.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
        }
    }

    /// Exponential part of the delay after failed attempt `attempt` (0-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32, rate_limited: bool) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let mut delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if rate_limited {
            delay = delay.saturating_mul(
                u32::try_from(RATE_LIMIT_BACKOFF_MULTIPLIER).unwrap_or(u32::MAX),
            );
        }
        delay
    }

    fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        rand::thread_rng().gen_range(self.jitter_min..=self.jitter_max)
    }
}

/// Run `operation` until it succeeds, fails terminally or attempts run out.
///
/// Only errors for which [`SourceError::is_transient`] holds are retried.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff(attempt, err.is_rate_limited()) + policy.jitter();
                tracing::warn!(
                    "Fetch failed for {} (attempt {}/{}): {}, retrying in {:?}...",
                    what,
                    attempt + 1,
                    policy.max_attempts,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
