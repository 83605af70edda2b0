//! Rate limiting and adaptive throttling for the cloud gateway
//!
//! Provides proactive rate limiting to avoid HTTP 429 (Too Many Requests)
//! responses from the gateway, which in turn protects the vendor API quotas
//! behind it.
//!
//! ## Architecture
//!
//! - [`TokenBucket`]: Classic token bucket algorithm for one request key
//! - [`RateLimiter`]: One bucket per key (the vendor), with capacity halved on
//!   429 and recovered gradually on success
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stratus_gateway::rate_limit::{RateLimitConfig, RateLimiter};
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(RateLimitConfig::default());
//! limiter.acquire("aws").await;
//! // ... make API call ...
//! limiter.on_success("aws");
//! # }
//! ```

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Successes needed before capacity grows back by one step
const RECOVERY_INTERVAL: u64 = 100;

/// Locks a mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// TokenBucket
// ============================================================================

#[derive(Debug)]
struct TokenBucketInner {
    /// Current number of available tokens (fractional for smooth refill)
    tokens: f64,
    /// Timestamp of the last refill calculation
    last_refill: Instant,
    /// Capacity after throttle adjustments
    effective_capacity: u32,
    /// Consecutive successes since the last throttle
    success_count: u64,
}

/// Token bucket rate limiter for a single key.
///
/// Tokens are consumed on each request and refilled at a constant rate.
/// When no tokens are available, callers must wait for refill.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum number of tokens in the bucket
    capacity: u32,
    /// Tokens added per second
    refill_rate: f64,
    inner: Mutex<TokenBucketInner>,
}

impl TokenBucket {
    /// Creates a new `TokenBucket`. The bucket starts full.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of tokens
    /// * `refill_rate` - Tokens added per second
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            inner: Mutex::new(TokenBucketInner {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
                effective_capacity: capacity,
                success_count: 0,
            }),
        }
    }

    fn refill(&self, inner: &mut TokenBucketInner) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(inner.last_refill).as_secs_f64();

        if elapsed_secs > 0.0 {
            inner.tokens = (inner.tokens + elapsed_secs * self.refill_rate)
                .min(f64::from(inner.effective_capacity));
            inner.last_refill = now;
        }
    }

    /// Attempts to take one token without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut inner = lock(&self.inner);
        self.refill(&mut inner);

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Returns the estimated wait until a token becomes available.
    pub fn time_until_available(&self) -> Duration {
        let mut inner = lock(&self.inner);
        self.refill(&mut inner);

        if inner.tokens >= 1.0 {
            Duration::ZERO
        } else if self.refill_rate > 0.0 {
            Duration::from_secs_f64((1.0 - inner.tokens) / self.refill_rate)
        } else {
            Duration::MAX
        }
    }

    /// Returns the current effective capacity (may be reduced by throttling).
    pub fn effective_capacity(&self) -> u32 {
        lock(&self.inner).effective_capacity
    }

    /// Records a successful call.
    ///
    /// Every 100 consecutive successes, the effective capacity grows by 5%
    /// (at least one token), up to the original capacity.
    pub fn on_success(&self) {
        let mut inner = lock(&self.inner);
        inner.success_count += 1;

        if inner.success_count % RECOVERY_INTERVAL == 0 && inner.effective_capacity < self.capacity {
            let increase = ((f64::from(inner.effective_capacity) * 0.05) as u32).max(1);
            let new_cap = (inner.effective_capacity + increase).min(self.capacity);
            debug!(
                old_capacity = inner.effective_capacity,
                new_capacity = new_cap,
                "Adaptive recovery: increasing bucket capacity"
            );
            inner.effective_capacity = new_cap;
        }
    }

    /// Records a 429 response: halves the effective capacity (minimum 1)
    /// and resets the success counter.
    pub fn on_throttle(&self) {
        let mut inner = lock(&self.inner);
        let old = inner.effective_capacity;
        inner.effective_capacity = (old / 2).max(1);
        inner.tokens = inner.tokens.min(f64::from(inner.effective_capacity));
        inner.success_count = 0;
        warn!(
            old_capacity = old,
            new_capacity = inner.effective_capacity,
            "Throttle detected: reducing bucket capacity"
        );
    }
}

// ============================================================================
// RateLimitConfig / RateLimiter
// ============================================================================

/// Configuration for the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Burst size per key
    pub capacity: u32,
    /// Sustained requests per second per key
    pub refill_rate: f64,
    /// Maximum number of retries on 429 responses
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            refill_rate: 20.0,
            max_retries: 5,
        }
    }
}

impl RateLimitConfig {
    /// Builds a config allowing `requests_per_second` with an equal burst
    pub fn per_second(requests_per_second: u32, max_retries: u32) -> Self {
        Self {
            capacity: requests_per_second.max(1),
            refill_rate: f64::from(requests_per_second.max(1)),
            max_retries,
        }
    }
}

/// Rate limiter managing one token bucket per key.
///
/// Thread-safe and designed to be shared via `Arc<RateLimiter>`.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Creates a new `RateLimiter` with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Returns the maximum number of 429 retries configured.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    fn with_bucket<F, R>(&self, key: &str, f: F) -> R
    where
        F: FnOnce(&TokenBucket) -> R,
    {
        let mut buckets = lock(&self.buckets);
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| {
            debug!(
                key,
                capacity = self.config.capacity,
                refill_rate = self.config.refill_rate,
                "Creating token bucket"
            );
            TokenBucket::new(self.config.capacity, self.config.refill_rate)
        });
        f(bucket)
    }

    /// Waits until a token for `key` is available, then takes it.
    pub async fn acquire(&self, key: &str) {
        loop {
            if self.with_bucket(key, TokenBucket::try_acquire) {
                return;
            }

            let wait = self
                .with_bucket(key, TokenBucket::time_until_available)
                .max(Duration::from_millis(10));
            debug!(key, wait_ms = wait.as_millis() as u64, "No tokens available, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Notifies the limiter that a call for `key` succeeded.
    pub fn on_success(&self, key: &str) {
        self.with_bucket(key, TokenBucket::on_success);
    }

    /// Notifies the limiter that a call for `key` was throttled.
    pub fn on_throttle(&self, key: &str) {
        info!(key, "Recording throttle event");
        self.with_bucket(key, TokenBucket::on_throttle);
    }

    /// Returns the effective capacity for `key`, if a bucket exists.
    pub fn effective_capacity(&self, key: &str) -> Option<u32> {
        lock(&self.buckets).get(key).map(TokenBucket::effective_capacity)
    }
}

// ============================================================================
// Retry-After header parsing
// ============================================================================

/// Parses a Retry-After header value into a Duration.
///
/// The header can be either:
/// - An integer number of seconds (e.g., "30")
/// - An HTTP-date (e.g., "Fri, 31 Dec 2027 23:59:59 GMT"), capped at one hour
///
/// Falls back to the default duration if parsing fails.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let diff = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(secs) = u64::try_from(diff.num_seconds()) {
            if secs <= 3600 {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
