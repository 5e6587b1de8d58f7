//! Bounded polling around an operation that may fail transiently.

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::Instant;

/// Fixed-interval retry bounded by a total timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Run `op` immediately, then every `policy.interval` until it succeeds or
/// `policy.timeout` has elapsed. On timeout the last failure is returned as context.
pub async fn poll_immediate<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let deadline = Instant::now() + policy.timeout;
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if Instant::now() + policy.interval > deadline {
                    return Err(anyhow!(
                        "timed out after {:?} ({} attempts), last error: {}",
                        policy.timeout,
                        attempt,
                        e
                    ));
                }
                tracing::warn!(attempt, error = %e, "attempt failed, retrying");
            }
        }
        tokio::time::sleep(policy.interval).await;
        attempt += 1;
    }
}
