//! Bounded retry with linear backoff.
//!
//! Transient provider failures (timeouts, connectivity, unknown server
//! errors) are retried. Invalid credentials and unknown locations fail
//! immediately since another attempt cannot succeed.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::WeatherError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Wait after attempt `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(backoff_ms),
        }
    }

    /// Delay after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError {
    /// Attempts exhausted or a permanent failure; carries the last cause
    Failed { attempts: u32, last: WeatherError },
    /// The cancellation token fired between attempts
    Cancelled { attempts: u32 },
}

/// Run `operation` until it succeeds, fails permanently, runs out of
/// attempts or `cancel` fires.
///
/// Cancellation is observed before each attempt and during the backoff
/// wait, never inside an attempt.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, WeatherError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            tracing::info!("Retry loop cancelled after {} attempts", attempt);
            return Err(RetryError::Cancelled { attempts: attempt });
        }

        attempt += 1;
        let error = match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("Succeeded after {} attempts", attempt);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            tracing::debug!("Non-retryable error: {}", error);
            return Err(RetryError::Failed { attempts: attempt, last: error });
        }
        if attempt >= max_attempts {
            tracing::warn!("All {} attempts exhausted: {}", attempt, error);
            return Err(RetryError::Failed { attempts: attempt, last: error });
        }

        let delay = policy.delay_for_attempt(attempt);
        tracing::warn!(
            "Attempt {} of {} failed: {}. Retrying in {:?}",
            attempt,
            max_attempts,
            error,
            delay
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Retry loop cancelled during backoff");
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
