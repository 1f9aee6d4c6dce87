//! Bounded retry with linear backoff for single scraping attempts.
//!
//! Transient failures (see [`FetchError::is_transient`]) are retried after a
//! pause that grows linearly with the retry number. Permanent failures are
//! surfaced immediately. Running out of attempts yields
//! [`RetryError::Exhausted`] carrying the last underlying error.

use std::future::Future;
use std::time::Duration;

use crate::error::{FetchError, RetryError};

/// How often and how patiently a query is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

/// A successful result together with the number of retries it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub retries: u32,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; zero is treated as one.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause before retry number `retry` (1-based): `base_delay × retry`.
    ///
    /// | Retry | Sleep (base 2 s) |
    /// |-------|------------------|
    /// | 1     | 2 s              |
    /// | 2     | 4 s              |
    /// | 3     | 6 s              |
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry)
    }

    /// Call `operation` until it succeeds, fails permanently, or
    /// `max_attempts` calls have been made.
    ///
    /// # Errors
    ///
    /// [`RetryError::Permanent`] for a non-transient failure,
    /// [`RetryError::Exhausted`] when every attempt failed transiently.
    pub async fn attempt<T, F, Fut>(&self, mut operation: F) -> Result<Attempted<T>, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        retries: attempt - 1,
                    })
                }
                Err(err) if !err.is_transient() => {
                    return Err(RetryError::Permanent {
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) if attempt >= self.max_attempts => {
                    tracing::error!(
                        attempts = attempt,
                        error = %err,
                        "retries exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient fetch error, retrying after backoff"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
