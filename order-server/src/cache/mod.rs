//! Cache Module
//!
//! Semantic contract of the external key-value store, plus the in-process
//! implementation. Callers treat the cache as best-effort: a backend failure
//! degrades to a direct read of the source of truth and never fails the
//! request.

mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;
use shared::error::AppResult;
use std::time::Duration;

/// Key-value cache contract
///
/// Values are opaque bytes; serialization is the caller's concern. Every
/// entry carries a TTL and may be dropped earlier under memory pressure —
/// correctness must never depend on a hit.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Scan-and-delete every key under the prefix; returns the removed count
    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize>;
}
