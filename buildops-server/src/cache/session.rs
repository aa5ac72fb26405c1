//! Short-lived auth state under `session:`

use std::sync::Arc;
use std::time::Duration;

use super::{CacheError, KvStore};

const PREFIX: &str = "session:";

#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KvStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn key(id: &str) -> String {
        format!("{PREFIX}{id}")
    }

    pub async fn get(&self, id: &str) -> Result<Option<String>, CacheError> {
        self.store.get(&Self::key(id)).await
    }

    pub async fn set(&self, id: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.store.set_ex(&Self::key(id), value, ttl).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), CacheError> {
        self.store.delete(&Self::key(id)).await
    }

    pub async fn extend(&self, id: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.store.expire(&Self::key(id), ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    #[tokio::test]
    async fn keys_are_prefixed() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let sessions = SessionStore::new(kv.clone());
        sessions
            .set("mfa:tok", "user-1", Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(
            kv.get("session:mfa:tok").await.unwrap().as_deref(),
            Some("user-1")
        );
        assert!(sessions.extend("mfa:tok", Duration::from_secs(300)).await.unwrap());
        sessions.delete("mfa:tok").await.unwrap();
        assert!(sessions.get("mfa:tok").await.unwrap().is_none());
    }
}
