//! Redis-backed store

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::{CacheError, KvStore};

/// Redis store over one multiplexed connection, cloned per command.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Open a client and establish the multiplexed connection.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!("connected to redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let updated: bool = conn.expire(key, ttl.as_secs().max(1) as i64).await?;
        Ok(updated)
    }

    /// `SET key 0 NX EX window` then `INCR key` in one MULTI/EXEC. The key
    /// never exists without its TTL, and INCR keeps the TTL of the window.
    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("NX")
            .arg("EX")
            .arg(window.as_secs().max(1))
            .ignore()
            .incr(key, 1_u64)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Run with: REDIS_URL=redis://localhost:6379 cargo test -p buildops-server -- --ignored

    #[tokio::test]
    #[ignore = "requires redis"]
    async fn set_get_delete() {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL required");
        let store = RedisStore::connect(&url).await.expect("redis connect failed");
        store.ping().await.unwrap();

        store
            .set_ex("test:buildops:key", "value", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(
            store.get("test:buildops:key").await.unwrap().as_deref(),
            Some("value")
        );
        store.delete("test:buildops:key").await.unwrap();
        assert!(store.get("test:buildops:key").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires redis"]
    async fn window_counter_always_has_ttl() {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL required");
        let store = RedisStore::connect(&url).await.expect("redis connect failed");
        let key = "test:buildops:window";
        store.delete(key).await.unwrap();

        let window = Duration::from_secs(30);
        assert_eq!(store.incr_window(key, window).await.unwrap(), 1);
        assert_eq!(store.incr_window(key, window).await.unwrap(), 2);

        let mut conn = store.conn.clone();
        let ttl: i64 = conn.ttl(key).await.unwrap();
        assert!((1..=30).contains(&ttl), "ttl was {ttl}");
        store.delete(key).await.unwrap();
    }
}
