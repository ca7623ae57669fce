use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ragflow_core::RagError;
use ragflow_eventbus::{dead_letter_topic, topics, BusMessage, DeadLetter, InProcessEventBus};
use ragflow_storage::{tenant_key, KvStore, ScoredChunk, SearchFilters, VectorIndex, VectorRecord};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// How long a `chunks.created` redelivery for the same `chunk_id` is still
/// recognized as a duplicate. Comfortably longer than any realistic bus
/// retry/backoff window.
const INDEXED_GUARD_TTL: Duration = Duration::from_secs(24 * 3600);

use crate::batcher::EmbeddingBatcher;
use crate::cache::EmbeddingCache;

#[derive(Debug, Deserialize)]
struct ChunkCreatedPayload {
    tenant_id: Uuid,
    document_id: Uuid,
    chunk_id: Uuid,
    #[serde(default)]
    sequence_number: i32,
    content: String,
    model_name: String,
}

/// Consumes `chunks.created`, embeds (cache-first, batched on miss), upserts
/// the vector, and acks with `chunks.indexed`. Retry-with-backoff and
/// dead-lettering on persistent failure are handled entirely by the bus
/// itself (returning `Err` from the consumer is enough); this service only
/// needs to additionally translate a dead-lettered chunk into `chunk.failed`,
/// which the bus has no notion of.
pub struct EmbeddingService {
    batcher: EmbeddingBatcher,
    cache: EmbeddingCache,
    vectors: Arc<dyn VectorIndex>,
    bus: Arc<InProcessEventBus>,
    kv: Arc<dyn KvStore>,
}

impl EmbeddingService {
    pub fn new(batcher: EmbeddingBatcher, cache: EmbeddingCache, vectors: Arc<dyn VectorIndex>, bus: Arc<InProcessEventBus>, kv: Arc<dyn KvStore>) -> Self {
        Self { batcher, cache, vectors, bus, kv }
    }

    /// `true` the first time this `chunk_id` is seen, `false` on any
    /// redelivery — backed by the same `incr_by`-as-set-once idiom
    /// `IngestionService` uses for its indexed-count counter.
    async fn first_delivery(&self, tenant_id: Uuid, chunk_id: Uuid) -> Result<bool, ragflow_eventbus::BusError> {
        let key = tenant_key(tenant_id, &format!("indexed:{chunk_id}"));
        let count = self
            .kv
            .incr_by(&key, 1, Some(INDEXED_GUARD_TTL))
            .await
            .map_err(|e| ragflow_eventbus::BusError::HandlerFailed(e.to_string()))?;
        Ok(count == 1)
    }

    /// Subscribes this service's consumers to the bus. Called once by the
    /// composition root at startup.
    pub async fn register(self: Arc<Self>) {
        let created = self.clone();
        self.bus
            .subscribe_fn(topics::CHUNKS_CREATED, move |message| {
                let svc = created.clone();
                async move { svc.handle_chunk_created(message).await }
            })
            .await;

        let dead_lettered = self.clone();
        self.bus
            .subscribe_fn(&dead_letter_topic(topics::CHUNKS_CREATED), move |message| {
                let svc = dead_lettered.clone();
                async move { svc.handle_chunk_dead_letter(message).await }
            })
            .await;
    }

    async fn handle_chunk_created(&self, message: BusMessage) -> Result<(), ragflow_eventbus::BusError> {
        let payload: ChunkCreatedPayload = serde_json::from_value(message.payload)
            .map_err(|e| ragflow_eventbus::BusError::HandlerFailed(format!("malformed chunks.created payload: {e}")))?;

        let embedding = self
            .embed(payload.tenant_id, &payload.content, &payload.model_name)
            .await
            .map_err(|e| ragflow_eventbus::BusError::HandlerFailed(e.to_string()))?;

        let dimension = embedding.len();
        let now = Utc::now();
        self.vectors
            .upsert(
                payload.tenant_id,
                VectorRecord {
                    chunk_id: payload.chunk_id,
                    embedding,
                    model_name: payload.model_name,
                    dimension,
                    created_at: now,
                    updated_at: now,
                    metadata: json!({
                        "document_id": payload.document_id,
                        "sequence_number": payload.sequence_number,
                        "content": payload.content,
                    }),
                },
            )
            .await
            .map_err(|e| ragflow_eventbus::BusError::HandlerFailed(e.to_string()))?;

        if !self.first_delivery(payload.tenant_id, payload.chunk_id).await? {
            return Ok(());
        }

        self.bus
            .publish(
                topics::CHUNKS_INDEXED,
                &payload.document_id.to_string(),
                json!({ "tenant_id": payload.tenant_id, "document_id": payload.document_id, "chunk_id": payload.chunk_id }),
            )
            .await?;
        Ok(())
    }

    async fn handle_chunk_dead_letter(&self, message: BusMessage) -> Result<(), ragflow_eventbus::BusError> {
        let dead_letter: DeadLetter = serde_json::from_value(message.payload)
            .map_err(|e| ragflow_eventbus::BusError::HandlerFailed(format!("malformed dead-letter envelope: {e}")))?;
        let original: ChunkCreatedPayload = serde_json::from_value(dead_letter.payload)
            .map_err(|e| ragflow_eventbus::BusError::HandlerFailed(format!("malformed dead-lettered chunks.created payload: {e}")))?;

        self.bus
            .publish(
                topics::CHUNK_FAILED,
                &original.document_id.to_string(),
                json!({
                    "tenant_id": original.tenant_id,
                    "document_id": original.document_id,
                    "chunk_id": original.chunk_id,
                    "reason": dead_letter.error,
                }),
            )
            .await?;
        Ok(())
    }

    /// Cache-first embed, shared by the `chunks.created` consumer and
    /// query-time search.
    async fn embed(&self, tenant_id: Uuid, content: &str, model: &str) -> Result<Vec<f32>, crate::error::EmbeddingError> {
        if let Some(cached) = self.cache.get(tenant_id, content, model).await {
            return Ok(cached);
        }
        let embedding = self.batcher.embed(model, content).await?;
        self.cache.put(tenant_id, content, model, &embedding).await;
        Ok(embedding)
    }

    /// Synchronous query-time embed, same cache path as the consumer.
    pub async fn embed_query(&self, tenant_id: Uuid, text: &str, model: &str) -> Result<Vec<f32>, RagError> {
        Ok(self.embed(tenant_id, text, model).await?)
    }

    pub async fn search(
        &self,
        tenant_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        Ok(self.vectors.search(tenant_id, embedding, top_k, filters).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockEmbeddingProvider;
    use ragflow_storage::{InMemoryKvStore, StorageError};
    use std::time::Duration;
    use tokio::sync::{Notify, RwLock as TokioRwLock};

    #[derive(Default)]
    struct FakeVectors {
        upserted: TokioRwLock<Vec<VectorRecord>>,
    }

    #[async_trait::async_trait]
    impl VectorIndex for FakeVectors {
        async fn upsert(&self, _tenant_id: Uuid, record: VectorRecord) -> Result<(), StorageError> {
            self.upserted.write().await.push(record);
            Ok(())
        }
        async fn search(&self, _tenant_id: Uuid, _embedding: &[f32], _top_k: usize, _filters: &SearchFilters) -> Result<Vec<ScoredChunk>, StorageError> {
            Ok(Vec::new())
        }
        async fn delete_for_document(&self, _tenant_id: Uuid, _document_id: Uuid) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn harness(vectors: Arc<FakeVectors>) -> (Arc<EmbeddingService>, Arc<InProcessEventBus>) {
        let provider = Arc::new(MockEmbeddingProvider::new(8, vec!["text-embedding-3-small".into()]));
        let batcher = EmbeddingBatcher::new(provider, 8, Duration::from_millis(10));
        let kv = Arc::new(InMemoryKvStore::new());
        let cache = EmbeddingCache::new(kv.clone());
        let bus = Arc::new(InProcessEventBus::new());
        let service = Arc::new(EmbeddingService::new(batcher, cache, vectors, bus.clone(), kv));
        (service, bus)
    }

    #[tokio::test]
    async fn chunk_created_produces_vector_and_indexed_event() {
        let vectors = Arc::new(FakeVectors::default());
        let (service, bus) = harness(vectors.clone());
        service.clone().register().await;

        let notify = Arc::new(Notify::new());
        let notify_clone = notify.clone();
        bus.subscribe_fn(topics::CHUNKS_INDEXED, move |_m| {
            let notify = notify_clone.clone();
            async move {
                notify.notify_one();
                Ok(())
            }
        })
        .await;

        let tenant_id = Uuid::new_v4();
        let document_id = Uuid::new_v4();
        let chunk_id = Uuid::new_v4();
        bus.publish(
            topics::CHUNKS_CREATED,
            &document_id.to_string(),
            json!({
                "tenant_id": tenant_id,
                "document_id": document_id,
                "chunk_id": chunk_id,
                "sequence_number": 0,
                "content": "some chunk text",
                "model_name": "text-embedding-3-small",
            }),
        )
        .await
        .unwrap();

        notify.notified().await;
        let stored = vectors.upserted.read().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].chunk_id, chunk_id);
        assert_eq!(stored[0].dimension, 8);
    }

    #[tokio::test]
    async fn redelivered_chunk_created_emits_indexed_at_most_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let vectors = Arc::new(FakeVectors::default());
        let (service, bus) = harness(vectors.clone());

        let indexed_count = Arc::new(AtomicUsize::new(0));
        let indexed_count_clone = indexed_count.clone();
        bus.subscribe_fn(topics::CHUNKS_INDEXED, move |_m| {
            let indexed_count = indexed_count_clone.clone();
            async move {
                indexed_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        let tenant_id = Uuid::new_v4();
        let document_id = Uuid::new_v4();
        let chunk_id = Uuid::new_v4();
        let message = || BusMessage {
            topic: topics::CHUNKS_CREATED.to_string(),
            key: document_id.to_string(),
            attempt: 1,
            payload: json!({
                "tenant_id": tenant_id,
                "document_id": document_id,
                "chunk_id": chunk_id,
                "sequence_number": 0,
                "content": "some chunk text",
                "model_name": "text-embedding-3-small",
            }),
        };

        // Simulates the same chunks.created delivery landing three times.
        for _ in 0..3 {
            service.handle_chunk_created(message()).await.unwrap();
        }

        assert_eq!(vectors.upserted.read().await.len(), 3);
        assert_eq!(indexed_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn embed_query_reuses_cache_on_second_call() {
        let vectors = Arc::new(FakeVectors::default());
        let (service, _bus) = harness(vectors);
        let tenant_id = Uuid::new_v4();
        let first = service.embed_query(tenant_id, "hello world", "text-embedding-3-small").await.unwrap();
        let second = service.embed_query(tenant_id, "hello world", "text-embedding-3-small").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_model_dead_letters_then_emits_chunk_failed() {
        // Short max_attempts/backoff so the bus's built-in retry-then-dead-letter
        // path runs quickly inside the test.
        let bus = Arc::new(InProcessEventBus::with_retry_policy(ragflow_eventbus::RetryPolicy {
            max_attempts: 1,
            backoff: Duration::from_millis(1),
        }));
        let provider = Arc::new(MockEmbeddingProvider::new(8, vec!["known-model".into()]));
        let batcher = EmbeddingBatcher::new(provider, 8, Duration::from_millis(5));
        let kv = Arc::new(InMemoryKvStore::new());
        let cache = EmbeddingCache::new(kv.clone());
        let service = Arc::new(EmbeddingService::new(batcher, cache, Arc::new(FakeVectors::default()), bus.clone(), kv));
        service.register().await;

        let notify = Arc::new(Notify::new());
        let notify_clone = notify.clone();
        bus.subscribe_fn(topics::CHUNK_FAILED, move |_m| {
            let notify = notify_clone.clone();
            async move {
                notify.notify_one();
                Ok(())
            }
        })
        .await;

        let document_id = Uuid::new_v4();
        let chunk_id = Uuid::new_v4();
        bus.publish(
            topics::CHUNKS_CREATED,
            &document_id.to_string(),
            json!({
                "tenant_id": Uuid::new_v4(),
                "document_id": document_id,
                "chunk_id": chunk_id,
                "sequence_number": 0,
                "content": "text",
                "model_name": "does-not-exist",
            }),
        )
        .await
        .unwrap();

        notify.notified().await;
    }
}
