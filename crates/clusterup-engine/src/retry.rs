//! Fixed-interval retry with cancellation.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use clusterup_config::DEFAULT_RETRY_INTERVAL_SECS;

/// How often, and how many times, an operation is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (0 = until success)
    pub max_attempts: u32,
    /// Pause between attempts
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
        }
    }
}

impl RetryPolicy {
    /// Policy with a bounded number of attempts
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Policy that retries until success or cancellation
    #[must_use]
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            max_attempts: 0,
            interval,
        }
    }

    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.max_attempts > 0
    }
}

/// Why [`retry_until`] stopped without a success.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The policy's attempt budget ran out; carries the last failure.
    Exhausted { attempts: u32, last: E },
    /// The token was cancelled before the next attempt.
    Cancelled { attempts: u32 },
}

/// Run `operation` until it succeeds, the policy is exhausted, or `cancel`
/// fires. `on_retry` runs before each pause, with the failed attempt number.
///
/// The pause is raced against the token, so cancellation is observed within
/// the interval rather than after it.
pub async fn retry_until<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation_name: &str,
    mut operation: F,
    mut on_retry: R,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: FnMut(u32, &E),
{
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { attempts: attempt });
        }
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if policy.is_bounded() && attempt >= policy.max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max attempts"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = policy.interval.as_millis(),
                    "Operation failed, retrying"
                );
                on_retry(attempt, &e);

                tokio::select! {
                    () = cancel.cancelled() => {
                        return Err(RetryError::Cancelled { attempts: attempt });
                    }
                    () = tokio::time::sleep(policy.interval) => {}
                }
            }
        }
    }
}
