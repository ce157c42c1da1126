//! Retry wrapper — re-run a fallible async operation a bounded number of times.
//!
//! Fixed delay between attempts, no backoff, no jitter. The first success
//! short-circuits; after the last failure the last error is returned.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` below 1 is clamped to 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt, no waiting.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_if(policy, op, |_| true).await
}

/// Like [`retry`], but gives up immediately on errors `should_retry` rejects.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Retry: operation succeeded");
                }
                return Ok(value);
            }
            Err(e) => {
                let retryable = should_retry(&e);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    retryable,
                    error = %e,
                    "Retry: attempt failed"
                );
                if !retryable || attempt >= policy.max_attempts {
                    return Err(e);
                }
            }
        }
        attempt += 1;
        tokio::time::sleep(policy.delay).await;
    }
}
