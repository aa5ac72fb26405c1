//! Key-value layer for short-lived state
//!
//! One [`KvStore`] seam with a Redis implementation and an in-process one.
//! Typed facades own a key prefix each:
//!
//! | facade             | prefix         |
//! |--------------------|----------------|
//! | [`SessionStore`]    | `session:`     |
//! | [`RateLimiter`]     | `ratelimit:`   |
//! | [`JsonCache`]       | `cache:`       |
//! | [`OnboardingStore`] | `onboarding:`  |

pub mod json;
pub mod memory;
pub mod onboarding;
pub mod rate_limit;
pub mod redis_store;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use json::JsonCache;
pub use memory::MemoryStore;
pub use onboarding::OnboardingStore;
pub use rate_limit::{RateDecision, RateLimiter};
pub use redis_store::RedisStore;
pub use session::SessionStore;

/// Cache error type
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cached value is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Minimal string key-value store with expiry
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Reset the TTL of an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Increment a counter; the first increment starts a `window`-long TTL.
    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64, CacheError>;

    /// Delete keys matching a glob whose only wildcard is a trailing `*`.
    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

/// Connect to Redis when a URL is configured, else fall back to the in-process store.
pub async fn connect(redis_url: Option<&str>) -> Result<Arc<dyn KvStore>, CacheError> {
    match redis_url {
        Some(url) => Ok(Arc::new(RedisStore::connect(url).await?)),
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory store (single process only)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
