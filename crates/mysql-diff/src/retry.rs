//! Bounded retry with exponential backoff and a per-attempt deadline.
//!
//! Every metadata read and checksum read goes through a [`RetryPolicy`].
//! Only errors for which [`DiffError::is_transient`] holds are retried;
//! anything else is returned from the first attempt unchanged.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::DiffConfig;
use crate::error::{DiffError, Result};

/// Retry settings injected into the introspector and checksum engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,

    /// Upper bound on a single delay.
    pub max_delay: Duration,

    /// Deadline for one attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DiffConfig::default())
    }
}

impl RetryPolicy {
    /// Build the policy from engine tuning.
    pub fn from_config(config: &DiffConfig) -> Self {
        Self {
            max_attempts: config.retry.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            max_delay: Duration::from_millis(config.retry.max_delay_ms),
            attempt_timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `operation` names the call in logs and errors.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => DiffError::Timeout {
                    operation: operation.to_string(),
                    secs: self.attempt_timeout.as_secs(),
                },
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                return Err(DiffError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let delay = self.backoff(attempt);
            warn!(
                "{} failed ({}), retry {}/{} in {:?}",
                operation,
                err,
                attempt,
                self.max_attempts - 1,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
