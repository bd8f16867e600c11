//! Idempotency Store
//!
//! A cache of canonical operation outcomes keyed by a fingerprint of
//! (user, operation, client key). It is a latency optimisation, never a
//! lock: two first-time requests may both perform the work and the database
//! unique constraint picks the single visible winner. Backend failures are
//! fail-open — a lookup miss is always safe.

use crate::cache::Cache;
use serde::{Deserialize, Serialize};
use shared::util::{now_millis, sha256_hex};
use std::sync::Arc;
use std::time::Duration;

/// Canonical outcome cached for replays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Status code of the original response
    pub status: u16,
    /// Canonical serialized response body
    pub body: Vec<u8>,
    pub created_at: i64,
}

/// Outcome cache keyed by request fingerprint
pub struct IdempotencyStore {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Fingerprint a logical request.
    ///
    /// The user id is folded in so a shared client-chosen string never
    /// collides across tenants; the operation name separates, say, a
    /// CreateOrder retry from a CreatePayment retry carrying the same key.
    pub fn fingerprint(user_id: &str, operation: &str, client_key: &str) -> String {
        sha256_hex(&format!("{user_id}:{operation}:{client_key}"))
    }

    /// Look up a cached outcome. Fail-open: backend errors log and miss.
    pub async fn lookup(&self, key: &str) -> Option<IdempotencyRecord> {
        let bytes = match self.cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Idempotency lookup failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "Corrupt idempotency record, treating as miss");
                None
            }
        }
    }

    /// Store the canonical outcome. Fail-open: errors log and succeed.
    pub async fn store(&self, key: &str, status: u16, body: Vec<u8>) {
        let record = IdempotencyRecord {
            status,
            body,
            created_at: now_millis(),
        };
        let bytes = match serde_json::to_vec(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize idempotency record");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, bytes, self.ttl).await {
            tracing::warn!(error = %e, "Failed to store idempotency record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use shared::error::{AppError, AppResult};

    fn store() -> IdempotencyStore {
        IdempotencyStore::new(Arc::new(MemoryCache::new()), Duration::from_secs(86400))
    }

    #[test]
    fn test_fingerprint_separates_tenants_and_operations() {
        let a = IdempotencyStore::fingerprint("u1", "create_order", "k1");
        let b = IdempotencyStore::fingerprint("u2", "create_order", "k1");
        let c = IdempotencyStore::fingerprint("u1", "create_payment", "k1");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, IdempotencyStore::fingerprint("u1", "create_order", "k1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_then_lookup_returns_same_bytes() {
        let store = store();
        let key = IdempotencyStore::fingerprint("u1", "create_order", "k1");
        store.store(&key, 200, b"canonical".to_vec()).await;

        let record = store.lookup(&key).await.unwrap();
        assert_eq!(record.status, 200);
        assert_eq!(record.body, b"canonical");
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_expires_after_ttl() {
        let store = IdempotencyStore::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        let key = IdempotencyStore::fingerprint("u1", "create_order", "k1");
        store.store(&key, 200, vec![1]).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.lookup(&key).await.is_none());
    }

    /// Cache that always errors, to prove the fail-open path
    struct BrokenCache;

    #[async_trait::async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
            Err(AppError::cache("backend down"))
        }
        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> AppResult<()> {
            Err(AppError::cache("backend down"))
        }
        async fn delete(&self, _key: &str) -> AppResult<()> {
            Err(AppError::cache("backend down"))
        }
        async fn delete_prefix(&self, _prefix: &str) -> AppResult<usize> {
            Err(AppError::cache("backend down"))
        }
    }

    #[tokio::test]
    async fn test_fail_open_on_backend_errors() {
        let store = IdempotencyStore::new(Arc::new(BrokenCache), Duration::from_secs(60));
        // store() swallows the error, lookup() misses
        store.store("k", 200, vec![]).await;
        assert!(store.lookup("k").await.is_none());
    }
}
