//! Retry with multiplicative backoff.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::error::{AppResult, Error};

/// How often and how patiently to retry a fallible operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero means one.
    pub attempts: u32,
    /// Wait after the first failure. Zero means one second.
    pub delay: Duration,
    /// Factor applied to the wait after every failure. Zero means 1.0.
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay: Duration::from_secs(1),
            backoff: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with `attempts` tries, an initial `delay` and a `backoff` factor.
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            attempts,
            delay,
            backoff,
        }
    }

    /// Replace zero fields with their defaults.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            attempts: self.attempts.max(1),
            delay: if self.delay.is_zero() {
                Duration::from_secs(1)
            } else {
                self.delay
            },
            backoff: if self.backoff == 0.0 { 1.0 } else { self.backoff },
        }
    }
}

/// Call `op` until it succeeds, the attempts run out, or `scope` is cancelled.
///
/// # Errors
///
/// Returns the last failure once every attempt failed, or
/// [`Error::Cancelled`] (as an `anyhow::Error`) if `scope` is cancelled first.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, scope: &CancellationToken, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let policy = policy.normalized();
    let mut delay = policy.delay;
    let mut attempt = 1;
    loop {
        let res = tokio::select! {
            biased;
            () = scope.cancelled() => return Err(Error::Cancelled.into()),
            res = op() => res,
        };
        let err = match res {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= policy.attempts => return Err(e),
            Err(e) => e,
        };
        debug!(attempt = attempt, delay_ms = delay.as_millis(), error = %err, "retrying");

        tokio::select! {
            biased;
            () = scope.cancelled() => return Err(Error::Cancelled.into()),
            () = tokio::time::sleep(delay) => {}
        }
        delay = delay.mul_f64(policy.backoff);
        attempt += 1;
    }
}
