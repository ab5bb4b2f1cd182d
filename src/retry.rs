//! Bounded retry with per-attempt timeout, shared by all polled connectors.

use crate::error::{ArbError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry parameters for one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Per-attempt timeout; elapse cancels the in-flight future.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Runs `op` up to `policy.attempts` times, each attempt bounded by
/// `policy.timeout`. The final attempt's error is surfaced.
pub async fn retry_with_timeout<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = ArbError::Transport(format!("{label}: no attempts made"));

    for attempt in 1..=policy.attempts.max(1) {
        match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                warn!("{label}: attempt {attempt}/{} failed: {e}", policy.attempts);
                last_err = e;
            }
            Err(_) => {
                warn!(
                    "{label}: attempt {attempt}/{} timed out after {:?}",
                    policy.attempts, policy.timeout
                );
                last_err = ArbError::Timeout(policy.timeout);
            }
        }
        if attempt < policy.attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(last_err)
}
