//! Retry policy with randomized backoff
//!
//! A [`RetryPolicy`] is created fresh for every operation. The caller runs
//! the operation and, on failure, either gives up (when the invocation just
//! made was the last one allowed) or calls [`RetryPolicy::sleep`] and tries
//! again. [`retry`] wraps that loop.
//!
//! `max_attempts` bounds *invocations*: a policy built with 3 allows the
//! operation to run three times and never a fourth.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use stratus_core::config::RetryConfig;
use tracing::{debug, warn};

use crate::SyncError;

/// Bounded-attempt retry state with uniform random backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_backoff: Duration,
    max_backoff: Duration,
    retries: u32,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` invocations, sleeping a
    /// random duration in `[min_ms, max_ms]` between two of them
    ///
    /// A zero `max_attempts` is treated as one. Swapped bounds are reordered.
    pub fn new(max_attempts: u32, min_ms: u64, max_ms: u64) -> Self {
        let (lo, hi) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        Self {
            max_attempts: max_attempts.max(1),
            min_backoff: Duration::from_millis(lo),
            max_backoff: Duration::from_millis(hi),
            retries: 0,
        }
    }

    /// Creates a policy from the `retry` configuration section
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.min_backoff_ms, config.max_backoff_ms)
    }

    /// Number of backoff sleeps taken so far
    pub fn retry_count(&self) -> u32 {
        self.retries
    }

    /// Maximum number of invocations
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns true if the invocation currently running is the last allowed
    pub fn is_last_attempt(&self) -> bool {
        self.retries + 1 >= self.max_attempts
    }

    /// Picks the next backoff delay
    pub fn next_delay(&self) -> Duration {
        let lo = self.min_backoff.as_millis() as u64;
        let hi = self.max_backoff.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// Sleeps a random backoff delay, then counts one retry
    pub async fn sleep(&mut self) {
        let delay = self.next_delay();
        debug!(
            delay_ms = delay.as_millis() as u64,
            retry = self.retries + 1,
            "Backing off before retry"
        );
        tokio::time::sleep(delay).await;
        self.retries += 1;
    }
}

/// Runs `op` under `policy` until it succeeds or the policy is exhausted
///
/// Each failed invocation is logged at warn level. The error of the last
/// invocation is returned.
pub async fn retry<T, F, Fut>(operation: &str, policy: &mut RetryPolicy, mut op: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let attempt = policy.retry_count() + 1;
                warn!(operation, attempt, max_attempts = policy.max_attempts(), error = %e, "Operation failed");
                if policy.is_last_attempt() {
                    return Err(e);
                }
                policy.sleep().await;
            }
        }
    }
}

/// Bounds `fut` by `limit`, turning an elapsed deadline into [`SyncError::Timeout`]
pub async fn with_timeout<T, Fut>(operation: &str, limit: Duration, fut: Fut) -> anyhow::Result<T>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        }
        .into()),
    }
}
