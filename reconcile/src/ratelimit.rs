//! Per-action request rate limiting
//!
//! Limiters are injected into API clients explicitly so tests can swap in
//! [`NoopLimiter`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default number of calls per second allowed for a single API action
pub const DEFAULT_ACTION_LIMIT: u32 = 20;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until one more call of `action` may be sent
    async fn acquire(&self, action: &str);
}

/// Limiter that never waits
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLimiter;

#[async_trait]
impl RateLimiter for NoopLimiter {
    async fn acquire(&self, _action: &str) {}
}

struct Bucket {
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(per_second: u32) -> Self {
        let capacity = f64::from(per_second.max(1));
        Self {
            tokens: capacity,
            capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.capacity).min(self.capacity);
        self.last_refill = now;
    }

    /// Take a token, or report how long until one is available
    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.capacity))
        }
    }
}

/// Token bucket per API action, refilled continuously at the action's limit
pub struct TokenBucketLimiter {
    default_limit: u32,
    overrides: HashMap<String, u32>,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucketLimiter {
    pub fn new(default_limit: u32) -> Self {
        Self {
            default_limit: default_limit.max(1),
            overrides: HashMap::new(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different limit for one action
    pub fn with_action_limit(mut self, action: impl Into<String>, per_second: u32) -> Self {
        self.overrides.insert(action.into(), per_second.max(1));
        self
    }

    pub fn limit_for(&self, action: &str) -> u32 {
        self.overrides
            .get(action)
            .copied()
            .unwrap_or(self.default_limit)
    }
}

impl Default for TokenBucketLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_LIMIT)
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn acquire(&self, action: &str) {
        loop {
            let wait = {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(action.to_string())
                    .or_insert_with(|| Bucket::new(self.limit_for(action)));
                match bucket.try_take(Instant::now()) {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            tracing::debug!("Rate limit reached for {}, waiting {:?}", action, wait);
            tokio::time::sleep(wait).await;
        }
    }
}
