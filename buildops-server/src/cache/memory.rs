//! In-process store used when no Redis URL is configured and in tests

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{CacheError, KvStore};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Writes sweep expired entries at most this often.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: Instant,
}

impl Entries {
    /// Drop expired entries if a sweep is due. Rate-limit windows are keyed
    /// per client, so without this the map grows with every address seen.
    fn sweep(&mut self, now: Instant) {
        if now.duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }
        let before = self.map.len();
        self.map.retain(|_, entry| entry.is_live(now));
        self.last_sweep = now;
        let removed = before - self.map.len();
        if removed > 0 {
            tracing::trace!(removed, "swept expired memory store entries");
        }
    }
}

/// HashMap store; expired entries vanish on read and in periodic sweeps on write
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.map.len()
    }
}

fn matches_pattern(key: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.map.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = Entry {
            value: value.to_owned(),
            expires_at: Some(now + ttl),
        };
        let mut entries = self.entries.lock().await;
        entries.sweep(now);
        entries.map.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.map.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.map.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.sweep(now);
        let entry = entries
            .map
            .entry(key.to_owned())
            .and_modify(|e| {
                if !e.is_live(now) {
                    e.value = "0".into();
                    e.expires_at = None;
                }
            })
            .or_insert_with(|| Entry {
                value: "0".into(),
                expires_at: None,
            });

        let count = entry.value.parse::<u64>().unwrap_or(0) + 1;
        entry.value = count.to_string();
        if count == 1 {
            entry.expires_at = Some(now + window);
        }
        Ok(count)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.lock().await;
        let before = entries.map.len();
        entries.map.retain(|key, _| !matches_pattern(key, pattern));
        Ok((before - entries.map.len()) as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn values_expire() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expire_extends_live_keys_only() {
        let store = MemoryStore::new();
        assert!(!store.expire("missing", Duration::from_secs(5)).await.unwrap());

        store.set_ex("k", "v", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.expire("k", Duration::from_secs(5)).await.unwrap());
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn window_counter_resets() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);
        assert_eq!(store.incr_window("hits", window).await.unwrap(), 1);
        assert_eq!(store.incr_window("hits", window).await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.incr_window("hits", window).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_windows_are_swept_on_write() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);
        for i in 0..5000 {
            store
                .incr_window(&format!("ratelimit:10.1.{}.{}", i / 256, i % 256), window)
                .await
                .unwrap();
        }
        assert_eq!(store.len().await, 5000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store.incr_window("ratelimit:203.0.113.9", window).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_live_entries() {
        let store = MemoryStore::new();
        store.set_ex("short", "v", Duration::from_secs(10)).await.unwrap();
        store.set_ex("long", "v", Duration::from_secs(600)).await.unwrap();

        tokio::time::advance(SWEEP_INTERVAL).await;
        store.set_ex("fresh", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert!(store.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_matching_prefix() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set_ex("cache:plans:active", "[]", ttl).await.unwrap();
        store.set_ex("cache:plans:all", "[]", ttl).await.unwrap();
        store.set_ex("cache:other", "{}", ttl).await.unwrap();

        assert_eq!(store.delete_matching("cache:plans:*").await.unwrap(), 2);
        assert!(store.get("cache:other").await.unwrap().is_some());
    }

    #[test]
    fn pattern_matching() {
        assert!(matches_pattern("session:abc", "session:*"));
        assert!(matches_pattern("exact", "exact"));
        assert!(!matches_pattern("exactly", "exact"));
    }
}
