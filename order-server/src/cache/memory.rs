//! In-memory cache backed by DashMap
//!
//! Expiry is lazy: a stale entry is dropped on the read that finds it, plus
//! whenever a write pass walks the map. Uses `tokio::time::Instant` so tests
//! under a paused clock see deterministic TTLs.

use super::Cache;
use async_trait::async_trait;
use dashmap::DashMap;
use shared::error::AppResult;
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local [`Cache`] implementation
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live (possibly stale) entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Drop the stale entry outside the read guard
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_set_get_roundtrip() {
        let cache = MemoryCache::new();
        cache
            .set("product:p1", b"hello".to_vec(), Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(
            cache.get("product:p1").await.unwrap(),
            Some(b"hello".to_vec())
        );
        assert_eq!(cache.get("product:p2").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("product:p1", b"v".to_vec(), Duration::from_secs(300))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get("product:p1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("product:p1").await.unwrap(), None);
        // Lazy expiry removed the entry
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_prefix_scans_list_keys() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(120);
        cache
            .set("products:list:{\"limit\":20}", b"a".to_vec(), ttl)
            .await
            .unwrap();
        cache
            .set("products:list:{\"limit\":50}", b"b".to_vec(), ttl)
            .await
            .unwrap();
        cache
            .set("product:p1", b"c".to_vec(), ttl)
            .await
            .unwrap();

        let removed = cache.delete_prefix("products:list:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get("product:p1").await.unwrap().is_some());
    }
}
