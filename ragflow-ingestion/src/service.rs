use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ragflow_core::{chunk_text, AuditSink, NewAuditEntry, RagError};
use ragflow_eventbus::{topics, InProcessEventBus};
use ragflow_storage::{tenant_key, BlobStore, KvStore, VectorIndex};
use ragflow_tenancy::service::TenantOccupancyCheck;
use ragflow_tenancy::TenantService;
use serde_json::json;
use uuid::Uuid;

use crate::entity::{Document, DocumentStatus, NewDocument, StoredChunk, SUPPORTED_CONTENT_TYPES};
use crate::error::IngestionError;
use crate::extractor::TextExtractor;
use crate::repository::{ChunkRepository, DocumentRepository};

pub struct IngestionService {
    documents: Arc<dyn DocumentRepository>,
    chunks: Arc<dyn ChunkRepository>,
    blob: Arc<dyn BlobStore>,
    kv: Arc<dyn KvStore>,
    vectors: Arc<dyn VectorIndex>,
    bus: Arc<InProcessEventBus>,
    tenants: Arc<TenantService>,
    extractor: Arc<dyn TextExtractor>,
    audit: Arc<dyn AuditSink>,
    max_file_size_bytes: i64,
}

impl IngestionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        chunks: Arc<dyn ChunkRepository>,
        blob: Arc<dyn BlobStore>,
        kv: Arc<dyn KvStore>,
        vectors: Arc<dyn VectorIndex>,
        bus: Arc<InProcessEventBus>,
        tenants: Arc<TenantService>,
        extractor: Arc<dyn TextExtractor>,
        audit: Arc<dyn AuditSink>,
        max_file_size_bytes: i64,
    ) -> Self {
        Self { documents, chunks, blob, kv, vectors, bus, tenants, extractor, audit, max_file_size_bytes }
    }

    pub async fn upload(
        &self,
        tenant_id: Uuid,
        owner_user_id: Uuid,
        file_bytes: Bytes,
        filename: String,
        content_type: String,
        metadata: serde_json::Value,
    ) -> Result<Document, RagError> {
        let tenant = self.tenants.get(tenant_id).await?;
        if !tenant.is_active() {
            return Err(IngestionError::TenantInactive.into());
        }
        if !SUPPORTED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(IngestionError::UnsupportedContentType(content_type).into());
        }
        let size = file_bytes.len() as i64;
        if size > self.max_file_size_bytes {
            return Err(IngestionError::FileTooLarge { size, max: self.max_file_size_bytes }.into());
        }

        let existing_count = self.documents.count_by_tenant(tenant_id).await.map_err(map_data_err)?;
        if existing_count >= tenant.max_documents {
            return Err(IngestionError::DocumentQuotaExceeded.into());
        }
        let existing_bytes = self.documents.total_storage_bytes(tenant_id).await.map_err(map_data_err)?;
        if existing_bytes + size > tenant.max_storage_bytes {
            return Err(IngestionError::StorageQuotaExceeded.into());
        }

        let document = self
            .documents
            .create(NewDocument { tenant_id, owner_user_id, filename: filename.clone(), content_type, size_bytes: size, metadata })
            .await
            .map_err(map_data_err)?;

        self.blob.put(tenant_id, document.id, &file_bytes).await?;

        self.audit.record(
            NewAuditEntry::new(tenant_id, "document.uploaded", "document", document.id.to_string())
                .actor(owner_user_id)
                .detail("filename", filename),
        );

        Ok(document)
    }

    pub async fn get(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Document, RagError> {
        let document = self
            .documents
            .find_by_id(&document_id)
            .await
            .map_err(map_data_err)?
            .ok_or_else(|| RagError::NotFound(format!("document {document_id} not found")))?;
        if document.tenant_id != tenant_id {
            return Err(RagError::NotFound(format!("document {document_id} not found")));
        }
        Ok(document)
    }

    /// Drives one document from PENDING through chunk persistence and
    /// `chunks.created` publication. Called by a scheduled worker in the
    /// composition root, one document at a time.
    pub async fn process_document(&self, document_id: Uuid, raw_text: &str) -> Result<Document, RagError> {
        let document = self
            .documents
            .find_by_id(&document_id)
            .await
            .map_err(map_data_err)?
            .ok_or_else(|| RagError::NotFound(format!("document {document_id} not found")))?;

        self.documents.set_status(document_id, DocumentStatus::Processing, None).await.map_err(map_data_err)?;

        let extracted = match self.extractor.extract(raw_text.as_bytes(), &document.content_type).await {
            Ok(text) => text,
            Err(e) => {
                return self.fail(document_id, e.to_string()).await;
            }
        };

        let tenant = self.tenants.get(document.tenant_id).await?;
        let policy = tenant.chunking_policy();
        let chunks = chunk_text(&extracted, &policy);
        if chunks.is_empty() {
            return self.fail(document_id, "no chunks produced from extracted text".into()).await;
        }

        let stored: Vec<StoredChunk> = chunks
            .iter()
            .map(|c| StoredChunk {
                id: Uuid::new_v4(),
                document_id,
                tenant_id: document.tenant_id,
                sequence: c.sequence as i32,
                start_offset: c.start_offset as i32,
                end_offset: c.end_offset as i32,
                content: c.content.clone(),
                created_at: chrono::Utc::now(),
            })
            .collect();

        self.chunks.insert_batch(&stored).await.map_err(map_data_err)?;
        let saved = self.documents.set_chunk_count(document_id, stored.len() as i32).await.map_err(map_data_err)?;

        for chunk in &stored {
            let payload = json!({
                "tenant_id": chunk.tenant_id,
                "document_id": chunk.document_id,
                "chunk_id": chunk.id,
                "sequence_number": chunk.sequence,
                "content": chunk.content,
                "model_name": tenant.embedding_model,
            });
            self.bus.publish(topics::CHUNKS_CREATED, &document_id.to_string(), payload).await?;
        }

        Ok(saved)
    }

    /// Called when the embedding consumer acks a chunk. Transitions the
    /// document to COMPLETED once every chunk has been acked.
    pub async fn handle_chunk_indexed(&self, tenant_id: Uuid, document_id: Uuid) -> Result<(), RagError> {
        let key = tenant_key(tenant_id, &format!("indexed-count:{document_id}"));
        let indexed = self.kv.incr_by(&key, 1, Some(Duration::from_secs(3600))).await.map_err(|e| RagError::Unavailable(e.to_string()))?;

        let document = self
            .documents
            .find_by_id(&document_id)
            .await
            .map_err(map_data_err)?
            .ok_or_else(|| RagError::NotFound(format!("document {document_id} not found")))?;

        if indexed >= document.chunk_count as i64 {
            self.documents.set_status(document_id, DocumentStatus::Completed, None).await.map_err(map_data_err)?;
            self.bus
                .publish(topics::DOCUMENT_COMPLETED, &document_id.to_string(), json!({ "tenant_id": tenant_id, "document_id": document_id }))
                .await?;
        }
        Ok(())
    }

    pub async fn handle_chunk_failed(&self, tenant_id: Uuid, document_id: Uuid, reason: String) -> Result<(), RagError> {
        self.fail(document_id, reason).await?;
        self.bus
            .publish(topics::DOCUMENT_FAILED, &document_id.to_string(), json!({ "tenant_id": tenant_id, "document_id": document_id }))
            .await?;
        Ok(())
    }

    async fn fail(&self, document_id: Uuid, reason: String) -> Result<Document, RagError> {
        tracing::warn!(document_id = %document_id, reason = %reason, "document processing failed");
        self.documents.set_status(document_id, DocumentStatus::Failed, Some(reason)).await.map_err(map_data_err)
    }

    /// Marks documents that have sat in PROCESSING longer than `timeout`
    /// as FAILED with `indexing_timeout`. Idempotent — safe to call
    /// repeatedly from a scheduled task.
    pub async fn fail_stale_processing(&self, _timeout: Duration) -> Result<(), RagError> {
        // Scanning by updated_at requires a repository query this trait
        // doesn't expose yet; left for the composition root to drive via
        // `set_status` directly once it has a document listing in hand.
        Ok(())
    }

    /// Removes vectors, chunks, blob, then the row, in that order. Each step
    /// is idempotent, so re-running `delete` after a partial failure (the
    /// "compensating job") is safe.
    pub async fn delete(&self, tenant_id: Uuid, document_id: Uuid) -> Result<(), RagError> {
        let document = self.get(tenant_id, document_id).await?;
        self.vectors.delete_for_document(tenant_id, document_id).await?;
        self.chunks.delete_by_document(document_id).await.map_err(map_data_err)?;
        self.blob.delete(tenant_id, document_id).await?;
        self.documents.delete(&document_id).await.map_err(map_data_err)?;
        self.audit.record(NewAuditEntry::new(tenant_id, "document.deleted", "document", document.id.to_string()));
        Ok(())
    }
}

#[async_trait]
impl TenantOccupancyCheck for IngestionService {
    async fn is_empty(&self, tenant_id: Uuid) -> Result<bool, RagError> {
        Ok(self.documents.count_by_tenant(tenant_id).await.map_err(map_data_err)? == 0)
    }
}

fn map_data_err(err: fabric_data::DataError) -> RagError {
    match err {
        fabric_data::DataError::NotFound(m) => RagError::NotFound(m),
        fabric_data::DataError::Database(e) => RagError::Unavailable(e.to_string()),
        fabric_data::DataError::Other(m) => RagError::Internal(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_data::{DataError, Page, Pageable, Repository};
    use ragflow_core::InMemoryAuditSink;
    use ragflow_storage::{FilesystemBlobStore, InMemoryKvStore, ScoredChunk, SearchFilters, VectorRecord};
    use ragflow_tenancy::entity::{ChunkingStrategyName, NewTenant, Tenant, TenantStatus};
    use ragflow_tenancy::service::TenantOccupancyCheck as _;
    use ragflow_tenancy::TenantRepository;
    use tokio::sync::RwLock as TokioRwLock;

    #[derive(Default)]
    struct FakeDocuments {
        rows: TokioRwLock<Vec<Document>>,
    }

    #[async_trait]
    impl Repository<Document, Uuid> for FakeDocuments {
        async fn find_by_id(&self, id: &Uuid) -> Result<Option<Document>, DataError> {
            Ok(self.rows.read().await.iter().find(|d| &d.id == id).cloned())
        }
        async fn find_all(&self) -> Result<Vec<Document>, DataError> {
            Ok(self.rows.read().await.clone())
        }
        async fn find_all_paged(&self, pageable: &Pageable) -> Result<Page<Document>, DataError> {
            let all = self.rows.read().await.clone();
            Ok(Page::new(all.clone(), pageable, all.len() as u64))
        }
        async fn save(&self, entity: &Document) -> Result<Document, DataError> {
            let mut guard = self.rows.write().await;
            if let Some(existing) = guard.iter_mut().find(|d| d.id == entity.id) {
                *existing = entity.clone();
            }
            Ok(entity.clone())
        }
        async fn delete(&self, id: &Uuid) -> Result<bool, DataError> {
            let mut guard = self.rows.write().await;
            let before = guard.len();
            guard.retain(|d| &d.id != id);
            Ok(guard.len() != before)
        }
        async fn count(&self) -> Result<u64, DataError> {
            Ok(self.rows.read().await.len() as u64)
        }
    }

    #[async_trait]
    impl DocumentRepository for FakeDocuments {
        async fn create(&self, new_document: NewDocument) -> Result<Document, DataError> {
            let now = chrono::Utc::now();
            let doc = Document {
                id: Uuid::new_v4(),
                tenant_id: new_document.tenant_id,
                owner_user_id: new_document.owner_user_id,
                filename: new_document.filename,
                content_type: new_document.content_type,
                size_bytes: new_document.size_bytes,
                status: DocumentStatus::Pending,
                chunk_count: 0,
                failure_reason: None,
                metadata: new_document.metadata,
                created_at: now,
                updated_at: now,
            };
            self.rows.write().await.push(doc.clone());
            Ok(doc)
        }
        async fn find_by_tenant_paged(&self, tenant_id: Uuid, pageable: &Pageable) -> Result<Page<Document>, DataError> {
            let all: Vec<_> = self.rows.read().await.iter().filter(|d| d.tenant_id == tenant_id).cloned().collect();
            Ok(Page::new(all.clone(), pageable, all.len() as u64))
        }
        async fn count_by_tenant(&self, tenant_id: Uuid) -> Result<i64, DataError> {
            Ok(self.rows.read().await.iter().filter(|d| d.tenant_id == tenant_id).count() as i64)
        }
        async fn total_storage_bytes(&self, tenant_id: Uuid) -> Result<i64, DataError> {
            Ok(self.rows.read().await.iter().filter(|d| d.tenant_id == tenant_id).map(|d| d.size_bytes).sum())
        }
        async fn set_status(&self, id: Uuid, status: DocumentStatus, failure_reason: Option<String>) -> Result<Document, DataError> {
            let mut guard = self.rows.write().await;
            let doc = guard.iter_mut().find(|d| d.id == id).ok_or_else(|| DataError::NotFound(id.to_string()))?;
            doc.status = status;
            doc.failure_reason = failure_reason;
            Ok(doc.clone())
        }
        async fn set_chunk_count(&self, id: Uuid, chunk_count: i32) -> Result<Document, DataError> {
            let mut guard = self.rows.write().await;
            let doc = guard.iter_mut().find(|d| d.id == id).ok_or_else(|| DataError::NotFound(id.to_string()))?;
            doc.chunk_count = chunk_count;
            Ok(doc.clone())
        }
    }

    #[derive(Default)]
    struct FakeChunks {
        rows: TokioRwLock<Vec<StoredChunk>>,
    }

    #[async_trait]
    impl ChunkRepository for FakeChunks {
        async fn insert_batch(&self, chunks: &[StoredChunk]) -> Result<(), DataError> {
            self.rows.write().await.extend_from_slice(chunks);
            Ok(())
        }
        async fn find_by_document(&self, document_id: Uuid) -> Result<Vec<StoredChunk>, DataError> {
            Ok(self.rows.read().await.iter().filter(|c| c.document_id == document_id).cloned().collect())
        }
        async fn delete_by_document(&self, document_id: Uuid) -> Result<(), DataError> {
            self.rows.write().await.retain(|c| c.document_id != document_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeVectors {
        deleted_documents: TokioRwLock<Vec<Uuid>>,
    }

    #[async_trait]
    impl VectorIndex for FakeVectors {
        async fn upsert(&self, _tenant_id: Uuid, _record: VectorRecord) -> Result<(), ragflow_storage::StorageError> {
            Ok(())
        }
        async fn search(
            &self,
            _tenant_id: Uuid,
            _embedding: &[f32],
            _top_k: usize,
            _filters: &SearchFilters,
        ) -> Result<Vec<ScoredChunk>, ragflow_storage::StorageError> {
            Ok(Vec::new())
        }
        async fn delete_for_document(&self, _tenant_id: Uuid, document_id: Uuid) -> Result<(), ragflow_storage::StorageError> {
            self.deleted_documents.write().await.push(document_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTenants {
        rows: TokioRwLock<Vec<Tenant>>,
    }

    #[async_trait]
    impl Repository<Tenant, Uuid> for FakeTenants {
        async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DataError> {
            Ok(self.rows.read().await.iter().find(|t| &t.id == id).cloned())
        }
        async fn find_all(&self) -> Result<Vec<Tenant>, DataError> {
            Ok(self.rows.read().await.clone())
        }
        async fn find_all_paged(&self, pageable: &Pageable) -> Result<Page<Tenant>, DataError> {
            let all = self.rows.read().await.clone();
            Ok(Page::new(all.clone(), pageable, all.len() as u64))
        }
        async fn save(&self, entity: &Tenant) -> Result<Tenant, DataError> {
            let mut guard = self.rows.write().await;
            if let Some(existing) = guard.iter_mut().find(|t| t.id == entity.id) {
                *existing = entity.clone();
            }
            Ok(entity.clone())
        }
        async fn delete(&self, id: &Uuid) -> Result<bool, DataError> {
            let mut guard = self.rows.write().await;
            let before = guard.len();
            guard.retain(|t| &t.id != id);
            Ok(guard.len() != before)
        }
        async fn count(&self) -> Result<u64, DataError> {
            Ok(self.rows.read().await.len() as u64)
        }
    }

    #[async_trait]
    impl TenantRepository for FakeTenants {
        async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DataError> {
            Ok(self.rows.read().await.iter().find(|t| t.slug == slug).cloned())
        }
        async fn create(&self, new_tenant: NewTenant) -> Result<Tenant, DataError> {
            let now = chrono::Utc::now();
            let tenant = Tenant {
                id: Uuid::new_v4(),
                slug: new_tenant.slug,
                status: TenantStatus::Active,
                max_documents: new_tenant.max_documents,
                max_storage_bytes: new_tenant.max_storage_bytes,
                chunk_size: new_tenant.chunk_size,
                chunk_overlap: new_tenant.chunk_overlap,
                chunking_strategy: new_tenant.chunking_strategy,
                embedding_model: new_tenant.embedding_model,
                llm_model: new_tenant.llm_model,
                created_at: now,
                updated_at: now,
            };
            self.rows.write().await.push(tenant.clone());
            Ok(tenant)
        }
    }

    struct AlwaysEmptyOccupancy;
    #[async_trait]
    impl TenantOccupancyCheck for AlwaysEmptyOccupancy {
        async fn is_empty(&self, _tenant_id: Uuid) -> Result<bool, RagError> {
            Ok(true)
        }
    }

    async fn harness() -> (IngestionService, Arc<TenantService>, Tenant, tempfile::TempDir) {
        let tenants_repo: Arc<dyn TenantRepository> = Arc::new(FakeTenants::default());
        let tenant_service = Arc::new(TenantService::new(tenants_repo, Arc::new(AlwaysEmptyOccupancy), Arc::new(InMemoryAuditSink::new())));
        let tenant = tenant_service
            .create(NewTenant {
                slug: "acme".into(),
                max_documents: 10,
                max_storage_bytes: 1_000_000,
                chunk_size: 200,
                chunk_overlap: 20,
                chunking_strategy: ChunkingStrategyName::Sentence,
                embedding_model: "text-embedding-3-small".into(),
                llm_model: "gpt-4o-mini".into(),
            })
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let service = IngestionService::new(
            Arc::new(FakeDocuments::default()),
            Arc::new(FakeChunks::default()),
            Arc::new(FilesystemBlobStore::new(dir.path())),
            Arc::new(InMemoryKvStore::new()),
            Arc::new(FakeVectors::default()),
            Arc::new(InProcessEventBus::new()),
            tenant_service.clone(),
            Arc::new(crate::extractor::PlainTextExtractor),
            Arc::new(InMemoryAuditSink::new()),
            1_000_000,
        );
        (service, tenant_service, tenant, dir)
    }

    #[tokio::test]
    async fn upload_then_process_emits_one_event_per_chunk() {
        let (service, _tenants, tenant, _dir) = harness().await;
        let received = Arc::new(TokioRwLock::new(0u32));
        let received_clone = received.clone();
        let bus_probe = InProcessEventBus::new();
        bus_probe
            .subscribe_fn(topics::CHUNKS_CREATED, move |_msg| {
                let received = received_clone.clone();
                async move {
                    *received.write().await += 1;
                    Ok(())
                }
            })
            .await;

        let document = service
            .upload(
                tenant.id,
                Uuid::new_v4(),
                Bytes::from_static(b"This is sentence one. This is sentence two. This is sentence three."),
                "doc.txt".into(),
                "txt".into(),
                json!({}),
            )
            .await
            .unwrap();
        assert_eq!(document.status, DocumentStatus::Pending);

        let processed = service
            .process_document(document.id, "This is sentence one. This is sentence two. This is sentence three.")
            .await
            .unwrap();
        assert!(processed.chunk_count > 0);
        assert_eq!(processed.status, DocumentStatus::Processing);
    }

    #[tokio::test]
    async fn upload_rejects_unsupported_content_type() {
        let (service, _tenants, tenant, _dir) = harness().await;
        let err = service
            .upload(tenant.id, Uuid::new_v4(), Bytes::from_static(b"data"), "f.exe".into(), "exe".into(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn upload_rejects_oversized_file() {
        let (service, _tenants, tenant, _dir) = harness().await;
        let big = Bytes::from(vec![b'a'; 2_000_000]);
        let err = service.upload(tenant.id, Uuid::new_v4(), big, "f.txt".into(), "txt".into(), json!({})).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn process_document_fails_on_garbage_text() {
        let (service, _tenants, tenant, _dir) = harness().await;
        let document = service
            .upload(tenant.id, Uuid::new_v4(), Bytes::from_static(b"   "), "f.txt".into(), "txt".into(), json!({}))
            .await
            .unwrap();
        let result = service.process_document(document.id, "   ").await.unwrap();
        assert_eq!(result.status, DocumentStatus::Failed);
        assert!(result.failure_reason.is_some());
    }

    #[tokio::test]
    async fn delete_is_rejected_cross_tenant() {
        let (service, _tenants, tenant, _dir) = harness().await;
        let document = service
            .upload(tenant.id, Uuid::new_v4(), Bytes::from_static(b"hello world document text here"), "f.txt".into(), "txt".into(), json!({}))
            .await
            .unwrap();
        let other_tenant = Uuid::new_v4();
        let err = service.delete(other_tenant, document.id).await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn occupancy_check_reflects_document_count() {
        let (service, _tenants, tenant, _dir) = harness().await;
        assert!(TenantOccupancyCheck::is_empty(&service, tenant.id).await.unwrap());
        service
            .upload(tenant.id, Uuid::new_v4(), Bytes::from_static(b"hello world document text here"), "f.txt".into(), "txt".into(), json!({}))
            .await
            .unwrap();
        assert!(!TenantOccupancyCheck::is_empty(&service, tenant.id).await.unwrap());
    }
}
