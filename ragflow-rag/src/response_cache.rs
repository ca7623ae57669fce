//! Mirrors [`ragflow_embedding::cache`]'s fingerprint-keyed KV cache, scoped
//! instead to a full query (tenant, query text, model, top_k) so an
//! identical question against an unchanged corpus skips generation.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ragflow_storage::{tenant_key, KvStore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::entity::QueryResponse;

const DEFAULT_TTL: Duration = Duration::from_secs(600);

fn fingerprint(query: &str, model: &str, top_k: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update(b"|");
    hasher.update(model.as_bytes());
    hasher.update(b"|");
    hasher.update(top_k.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct ResponseCache {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv, ttl: DEFAULT_TTL }
    }

    pub fn with_ttl(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    fn key(&self, tenant_id: Uuid, query: &str, model: &str, top_k: usize) -> String {
        tenant_key(tenant_id, &format!("response-cache:{}", fingerprint(query, model, top_k)))
    }

    pub async fn get(&self, tenant_id: Uuid, query: &str, model: &str, top_k: usize) -> Option<QueryResponse> {
        let key = self.key(tenant_id, query, model, top_k);
        let bytes = self.kv.get(&key).await.ok().flatten()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub async fn put(
        &self,
        tenant_id: Uuid,
        query: &str,
        model: &str,
        top_k: usize,
        response: &QueryResponse,
    ) -> Result<(), ragflow_storage::StorageError> {
        let key = self.key(tenant_id, query, model, top_k);
        let bytes = serde_json::to_vec(response)
            .map_err(|e| ragflow_storage::StorageError::Backend(e.to_string()))?;
        self.kv.set(&key, Bytes::from(bytes), Some(self.ttl)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::QueryMetrics;
    use ragflow_storage::InMemoryKvStore;

    fn sample_response() -> QueryResponse {
        QueryResponse { answer: "hello".into(), citations: Vec::new(), metrics: QueryMetrics::default() }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = ResponseCache::new(Arc::new(InMemoryKvStore::new()));
        let tenant_id = Uuid::new_v4();
        cache.put(tenant_id, "what is rag?", "gpt", 5, &sample_response()).await.unwrap();
        let hit = cache.get(tenant_id, "what is rag?", "gpt", 5).await.unwrap();
        assert_eq!(hit.answer, "hello");
    }

    #[tokio::test]
    async fn miss_when_top_k_differs() {
        let cache = ResponseCache::new(Arc::new(InMemoryKvStore::new()));
        let tenant_id = Uuid::new_v4();
        cache.put(tenant_id, "q", "gpt", 5, &sample_response()).await.unwrap();
        assert!(cache.get(tenant_id, "q", "gpt", 8).await.is_none());
    }

    #[tokio::test]
    async fn miss_for_different_tenant() {
        let cache = ResponseCache::new(Arc::new(InMemoryKvStore::new()));
        cache.put(Uuid::new_v4(), "q", "gpt", 5, &sample_response()).await.unwrap();
        assert!(cache.get(Uuid::new_v4(), "q", "gpt", 5).await.is_none());
    }
}
