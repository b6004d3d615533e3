//! Retry with exponential backoff for collaborator calls
//!
//! Shared by the suggestion service (HTTP) and the async recipe store
//! (SQLite busy/locked errors).

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// An error type that knows which of its failures are worth another attempt.
pub trait RetryableError: fmt::Display + Sized {
    fn is_transient(&self) -> bool;

    /// Wrap the last failure once every attempt has been used.
    fn exhausted(attempts: u32, last: Self) -> Self;
}

/// How a failing operation is retried.
#[derive(Debug)]
pub struct RetryPolicy<E> {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure
    pub base_delay: Duration,
    pub is_retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            is_retryable: self.is_retryable,
        }
    }
}

impl<E: RetryableError> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl<E: RetryableError> RetryPolicy<E> {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            is_retryable: E::is_transient,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts. The operation receives the 1-based attempt number.
    ///
    /// Dropping the returned future cancels the pending attempt or backoff.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !(self.is_retryable)(&e) => {
                    error!("Attempt {} failed permanently: {}", attempt, e);
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    error!("Attempt {}/{} failed, giving up: {}", attempt, max_attempts, e);
                    return Err(E::exhausted(attempt, e));
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "Attempt {}/{} failed: {} - retrying in {}ms",
                        attempt,
                        max_attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
