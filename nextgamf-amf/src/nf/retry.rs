//! Bounded retry with exponential backoff for façade calls

use std::future::Future;
use std::time::Duration;

use nextgamf_common::RetryConfig;
use tracing::{debug, warn};

use super::{NfError, NfResult};

/// Retry policy owned by the caller of an [`NfFacade`](super::NfFacade).
///
/// `NotFound` is returned at once. `Unavailable` and timed-out attempts are
/// retried up to `max_attempts` in total, sleeping between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    call_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig, call_timeout: Duration) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier.max(1.0),
            call_timeout,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt number `attempt` (1-based), never more
    /// than the configured maximum.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exp);
        if delay >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::try_from_secs_f64(delay).unwrap_or(self.max_backoff)
    }

    /// Runs `call` until it succeeds, fails with `NotFound`, or the attempts
    /// run out.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut call: F) -> NfResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NfResult<T>>,
    {
        let mut attempt = 1;
        loop {
            let err = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err @ NfError::NotFound(_))) => return Err(err),
                Ok(Err(err)) => err,
                Err(_) => NfError::Unavailable(format!("{operation} timed out")),
            };

            if attempt >= self.max_attempts {
                warn!("{} failed after {} attempts: {}", operation, attempt, err);
                return Err(err);
            }
            let delay = self.backoff(attempt);
            debug!(
                "{} attempt {} failed ({}), retrying in {:?}",
                operation, attempt, err, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
