//! Fixed-window request counter under `ratelimit:`

use std::sync::Arc;
use std::time::Duration;

use super::{CacheError, KvStore};

const PREFIX: &str = "ratelimit:";

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub count: u64,
    pub limit: u64,
    pub allowed: bool,
}

impl RateDecision {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.count)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, max_requests: u64, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    /// Count a request for `key` and decide whether it may proceed.
    pub async fn hit(&self, key: &str) -> Result<RateDecision, CacheError> {
        let count = self
            .store
            .incr_window(&format!("{PREFIX}{key}"), self.window)
            .await?;
        Ok(RateDecision {
            count,
            limit: self.max_requests,
            allowed: count <= self.max_requests,
        })
    }

    /// Requests counted so far in the current window.
    pub async fn current(&self, key: &str) -> Result<u64, CacheError> {
        let raw = self.store.get(&format!("{PREFIX}{key}")).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn blocks_after_limit_until_window_ends() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()), 3, Duration::from_secs(60));

        for expected in 1..=3 {
            let decision = limiter.hit("10.0.0.1").await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.count, expected);
        }
        let blocked = limiter.hit("10.0.0.1").await.unwrap();
        assert!(!blocked.allowed);
        assert_eq!(blocked.remaining(), 0);

        // Other clients are counted separately
        assert!(limiter.hit("10.0.0.2").await.unwrap().allowed);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.hit("10.0.0.1").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn current_reads_without_counting() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()), 10, Duration::from_secs(60));
        assert_eq!(limiter.current("ip").await.unwrap(), 0);
        limiter.hit("ip").await.unwrap();
        limiter.hit("ip").await.unwrap();
        assert_eq!(limiter.current("ip").await.unwrap(), 2);
    }
}
