//! Onboarding drafts under `onboarding:`, kept for seven days

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::{CacheError, KvStore};

const PREFIX: &str = "onboarding:";
const DRAFT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Clone)]
pub struct OnboardingStore {
    store: Arc<dyn KvStore>,
}

impl OnboardingStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn key(tenant_id: Uuid) -> String {
        format!("{PREFIX}{tenant_id}")
    }

    pub async fn get(&self, tenant_id: Uuid) -> Result<Option<Value>, CacheError> {
        match self.store.get(&Self::key(tenant_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, tenant_id: Uuid, draft: &Value) -> Result<(), CacheError> {
        let raw = serde_json::to_string(draft)?;
        self.store.set_ex(&Self::key(tenant_id), &raw, DRAFT_TTL).await
    }

    /// Shallow-merge `patch` into the stored draft and refresh its TTL.
    pub async fn update(&self, tenant_id: Uuid, patch: Map<String, Value>) -> Result<Value, CacheError> {
        let mut merged = match self.get(tenant_id).await? {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        merged.extend(patch);
        let merged = Value::Object(merged);
        self.set(tenant_id, &merged).await?;
        Ok(merged)
    }

    pub async fn delete(&self, tenant_id: Uuid) -> Result<(), CacheError> {
        self.store.delete(&Self::key(tenant_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn update_merges_top_level_keys() {
        let drafts = OnboardingStore::new(Arc::new(MemoryStore::new()));
        let tenant = Uuid::new_v4();

        drafts
            .update(tenant, object(json!({"company": {"name": "Acme"}})))
            .await
            .unwrap();
        let merged = drafts
            .update(tenant, object(json!({"branding": {"brand_color": "#112233"}})))
            .await
            .unwrap();

        assert_eq!(merged["company"]["name"], "Acme");
        assert_eq!(merged["branding"]["brand_color"], "#112233");
        assert_eq!(drafts.get(tenant).await.unwrap(), Some(merged));
    }

    #[tokio::test(start_paused = true)]
    async fn drafts_expire_after_a_week() {
        let drafts = OnboardingStore::new(Arc::new(MemoryStore::new()));
        let tenant = Uuid::new_v4();
        drafts.set(tenant, &json!({"team": {}})).await.unwrap();

        tokio::time::advance(DRAFT_TTL + Duration::from_secs(1)).await;
        assert!(drafts.get(tenant).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_clears_draft() {
        let drafts = OnboardingStore::new(Arc::new(MemoryStore::new()));
        let tenant = Uuid::new_v4();
        drafts.set(tenant, &json!({"a": 1})).await.unwrap();
        drafts.delete(tenant).await.unwrap();
        assert!(drafts.get(tenant).await.unwrap().is_none());
    }
}
