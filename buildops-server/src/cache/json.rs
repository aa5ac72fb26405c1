//! Typed JSON cache under `cache:`

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{CacheError, KvStore};

const PREFIX: &str = "cache:";

#[derive(Clone)]
pub struct JsonCache {
    store: Arc<dyn KvStore>,
}

impl JsonCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.store.get(&format!("{PREFIX}{key}")).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.store.set_ex(&format!("{PREFIX}{key}"), &raw, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.delete(&format!("{PREFIX}{key}")).await
    }

    /// Drop every entry whose key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        self.store.delete_matching(&format!("{PREFIX}{prefix}*")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Plan {
        slug: String,
        price_cents: i64,
    }

    #[tokio::test]
    async fn typed_values() {
        let cache = JsonCache::new(Arc::new(MemoryStore::new()));
        let plans = vec![Plan {
            slug: "pro".into(),
            price_cents: 4900,
        }];
        cache
            .set("plans:active", &plans, Duration::from_secs(60))
            .await
            .unwrap();

        let cached: Option<Vec<Plan>> = cache.get("plans:active").await.unwrap();
        assert_eq!(cached, Some(plans));

        assert_eq!(cache.invalidate_prefix("plans:").await.unwrap(), 1);
        let gone: Option<Vec<Plan>> = cache.get("plans:active").await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn malformed_entry_is_error() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        kv.set_ex("cache:bad", "not json", Duration::from_secs(60))
            .await
            .unwrap();
        let cache = JsonCache::new(kv);
        let result: Result<Option<Plan>, _> = cache.get("bad").await;
        assert!(matches!(result, Err(CacheError::Serde(_))));
    }
}
