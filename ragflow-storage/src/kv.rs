//! Shared KV/cache adapter backing the response cache, embedding cache,
//! rate-limit buckets, token revocation set, conversation summaries, and
//! per-document indexing counters. Every key passed to a [`KvStore`] method
//! is expected to already carry the `tenant:<tenant_id>:` prefix — callers
//! build keys with [`tenant_key`] rather than formatting it ad hoc so the
//! prefix can never be forgotten.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::StorageError;

/// Builds the `tenant:<tenant_id>:<rest>` key every KV access is scoped by.
pub fn tenant_key(tenant_id: Uuid, rest: &str) -> String {
    format!("tenant:{tenant_id}:{rest}")
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError>;
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Atomically add `delta` to the integer stored at `key` (defaulting to
    /// zero if absent) and return the new value. Used for rate-limit token
    /// refill/consume and the per-document indexing counter, where a
    /// read-modify-write without compare-and-set would race under concurrent
    /// callers.
    async fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, StorageError>;
}

struct Entry {
    value: Bytes,
    expires_at: Option<std::time::Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(at) => std::time::Instant::now() < at,
            None => true,
        }
    }
}

/// Single-process KV store backed by `DashMap`, mirroring the sharding and
/// lazy-eviction approach `fabric_cache::InMemoryStore` uses for its cache
/// backend. A multi-instance gateway deployment would back [`KvStore`] with
/// a shared backend instead (Redis, etc.) behind this same trait.
#[derive(Clone, Default)]
pub struct InMemoryKvStore {
    inner: Arc<DashMap<String, Entry>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        if let Some(entry) = self.inner.get(key) {
            if entry.is_live() {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.inner.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StorageError> {
        let expires_at = ttl.map(|d| std::time::Instant::now() + d);
        self.inner.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, StorageError> {
        let expires_at = ttl.map(|d| std::time::Instant::now() + d);
        let mut new_value = delta;
        self.inner
            .entry(key.to_string())
            .and_modify(|entry| {
                let current = if entry.is_live() {
                    parse_i64(&entry.value)
                } else {
                    0
                };
                new_value = current + delta;
                entry.value = Bytes::from(new_value.to_string());
                entry.expires_at = expires_at.or(entry.expires_at);
            })
            .or_insert_with(|| Entry { value: Bytes::from(new_value.to_string()), expires_at });
        Ok(new_value)
    }
}

fn parse_i64(bytes: &Bytes) -> i64 {
    std::str::from_utf8(bytes).ok().and_then(|s| s.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryKvStore::new();
        let key = tenant_key(Uuid::new_v4(), "response-cache:abc");
        store.set(&key, Bytes::from_static(b"value"), None).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(Bytes::from_static(b"value")));
    }

    #[tokio::test]
    async fn ttl_expiry_evicts_on_read() {
        let store = InMemoryKvStore::new();
        let key = "tenant:t:short-lived".to_string();
        store.set(&key, Bytes::from_static(b"v"), Some(Duration::from_millis(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_by_accumulates() {
        let store = InMemoryKvStore::new();
        let key = "tenant:t:counter".to_string();
        assert_eq!(store.incr_by(&key, 5, None).await.unwrap(), 5);
        assert_eq!(store.incr_by(&key, -2, None).await.unwrap(), 3);
        assert_eq!(store.incr_by(&key, -3, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tenant_key_embeds_prefix() {
        let tenant = Uuid::new_v4();
        let key = tenant_key(tenant, "embedding-cache:hash1");
        assert!(key.starts_with(&format!("tenant:{tenant}:")));
    }
}
