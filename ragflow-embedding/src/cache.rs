//! Embedding cache keyed by `hash(content)|model|tenant_id`, stored through
//! the shared KV adapter. Cross-tenant reuse is impossible by construction:
//! `tenant_key` prefixes every key with the tenant id before the fingerprint
//! is ever computed.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ragflow_storage::{tenant_key, KvStore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

pub fn fingerprint(content: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(b"|");
    hasher.update(model.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct EmbeddingCache {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl EmbeddingCache {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv, ttl: DEFAULT_TTL }
    }

    pub fn with_ttl(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    fn key(&self, tenant_id: Uuid, content: &str, model: &str) -> String {
        tenant_key(tenant_id, &format!("embedding-cache:{}", fingerprint(content, model)))
    }

    pub async fn get(&self, tenant_id: Uuid, content: &str, model: &str) -> Option<Vec<f32>> {
        let key = self.key(tenant_id, content, model);
        let bytes = self.kv.get(&key).await.ok().flatten()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub async fn put(&self, tenant_id: Uuid, content: &str, model: &str, embedding: &[f32]) {
        let key = self.key(tenant_id, content, model);
        if let Ok(bytes) = serde_json::to_vec(embedding) {
            let _ = self.kv.set(&key, Bytes::from(bytes), Some(self.ttl)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragflow_storage::InMemoryKvStore;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = EmbeddingCache::new(Arc::new(InMemoryKvStore::new()));
        let tenant = Uuid::new_v4();
        cache.put(tenant, "hello world", "m1", &[0.1, 0.2, 0.3]).await;
        let got = cache.get(tenant, "hello world", "m1").await.unwrap();
        assert_eq!(got, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn miss_for_different_tenant() {
        let cache = EmbeddingCache::new(Arc::new(InMemoryKvStore::new()));
        cache.put(Uuid::new_v4(), "hello world", "m1", &[0.1, 0.2]).await;
        assert!(cache.get(Uuid::new_v4(), "hello world", "m1").await.is_none());
    }

    #[tokio::test]
    async fn miss_for_different_model() {
        let cache = EmbeddingCache::new(Arc::new(InMemoryKvStore::new()));
        let tenant = Uuid::new_v4();
        cache.put(tenant, "hello world", "m1", &[0.1, 0.2]).await;
        assert!(cache.get(tenant, "hello world", "m2").await.is_none());
    }

    #[test]
    fn fingerprint_differs_by_content_and_model() {
        let a = fingerprint("hello", "m1");
        let b = fingerprint("hello", "m2");
        let c = fingerprint("world", "m1");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
