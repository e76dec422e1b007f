//! Per-call wrappers for provider invocations
//!
//! - [`with_timeout`]: bounds one call; expiry becomes a transport error
//! - [`RetryPolicy`]: re-issues a failed call on transient errors
//!
//! The differ never sees either of them: a retried call is still the one
//! action it classified.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Run `call`, failing with [`Error::Transport`] if it outlives `timeout`
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::transport(format!(
            "call timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Bounded retry with exponential backoff
///
/// Only [transient](Error::is_transient) failures are retried. With
/// `max_retries = 0` a call is attempted exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Single attempt per pass
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(16) as u32;
        self.initial_backoff.saturating_mul(factor)
    }

    /// Invoke `call` until it succeeds, fails permanently, or retries run out
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    debug!(
                        "{} failed ({}), retry {}/{} in {}ms",
                        label,
                        e,
                        attempt,
                        self.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
