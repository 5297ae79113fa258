//! Retry wrapper around single submit or read attempts

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Classify, RetryError, RetryFailure};
use crate::state::{instant_after, READ_RETRY_TIMEOUT, WRITE_RETRY_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: READ_RETRY_TIMEOUT,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Policy for describe calls
    pub fn read() -> Self {
        Self::with_timeout(READ_RETRY_TIMEOUT)
    }

    /// Policy for mutating calls
    pub fn write() -> Self {
        Self::with_timeout(WRITE_RETRY_TIMEOUT)
    }

    /// Sleep before the attempt following attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(self.initial_backoff.saturating_mul(factor), self.max_backoff)
    }
}

/// Run `op` until it succeeds, returns a fatal error, or `policy.timeout`
/// elapses. No attempt is started after the deadline; an attempt already in
/// flight is not interrupted.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
    E: Display,
{
    let deadline = instant_after(Instant::now(), policy.timeout);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!("Operation succeeded after {} attempts", attempt);
                }
                return Ok(value);
            }
            Err(RetryError::Fatal(e)) => {
                tracing::error!("Operation failed with non-retryable error: {}", e);
                return Err(RetryFailure::Fatal(e));
            }
            Err(RetryError::Retryable(e)) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(timed_out(policy, attempt, e));
                }

                let backoff = std::cmp::min(policy.backoff(attempt), deadline - now);
                tracing::warn!(
                    "Retryable error on attempt {}, retrying in {}ms: {}",
                    attempt,
                    backoff.as_millis(),
                    e
                );
                tokio::time::sleep(backoff).await;

                if Instant::now() >= deadline {
                    return Err(timed_out(policy, attempt, e));
                }
            }
        }
    }
}

/// [`retry`] for operations whose error type classifies itself
pub async fn retry_classified<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    retry(policy, || {
        let attempt = op();
        async move { attempt.await.map_err(RetryError::classified) }
    })
    .await
}

fn timed_out<E: Display>(policy: &RetryPolicy, attempts: u32, last: E) -> RetryFailure<E> {
    tracing::error!(
        "Giving up after {} attempts in {:?}: {}",
        attempts,
        policy.timeout,
        last
    );
    RetryFailure::Timeout {
        attempts,
        timeout: policy.timeout,
        last,
    }
}
