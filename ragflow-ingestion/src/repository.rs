use async_trait::async_trait;
use fabric_data::{DataError, Page, Pageable, Repository};
use fabric_data_sqlx::SqlxErrorExt;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entity::{Document, DocumentStatus, NewDocument, StoredChunk};

#[async_trait]
pub trait DocumentRepository: Repository<Document, Uuid> {
    async fn create(&self, new_document: NewDocument) -> Result<Document, DataError>;
    async fn find_by_tenant_paged(&self, tenant_id: Uuid, pageable: &Pageable) -> Result<Page<Document>, DataError>;
    async fn count_by_tenant(&self, tenant_id: Uuid) -> Result<i64, DataError>;
    async fn total_storage_bytes(&self, tenant_id: Uuid) -> Result<i64, DataError>;
    async fn set_status(&self, id: Uuid, status: DocumentStatus, failure_reason: Option<String>) -> Result<Document, DataError>;
    async fn set_chunk_count(&self, id: Uuid, chunk_count: i32) -> Result<Document, DataError>;
}

#[async_trait]
pub trait ChunkRepository: Send + Sync {
    async fn insert_batch(&self, chunks: &[StoredChunk]) -> Result<(), DataError>;
    async fn find_by_document(&self, document_id: Uuid) -> Result<Vec<StoredChunk>, DataError>;
    async fn delete_by_document(&self, document_id: Uuid) -> Result<(), DataError>;
}

#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Document, Uuid> for PgDocumentRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Document>, DataError> {
        sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_all(&self) -> Result<Vec<Document>, DataError> {
        sqlx::query_as::<_, Document>("SELECT * FROM documents ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_all_paged(&self, pageable: &Pageable) -> Result<Page<Document>, DataError> {
        let content = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents ORDER BY created_at LIMIT $1 OFFSET $2",
        )
        .bind(pageable.size as i64)
        .bind(pageable.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

        Ok(Page::new(content, pageable, total as u64))
    }

    async fn save(&self, entity: &Document) -> Result<Document, DataError> {
        sqlx::query_as::<_, Document>(
            r#"
            UPDATE documents SET
                filename = $2, content_type = $3, size_bytes = $4, status = $5,
                chunk_count = $6, failure_reason = $7, metadata = $8, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(entity.id)
        .bind(&entity.filename)
        .bind(&entity.content_type)
        .bind(entity.size_bytes)
        .bind(entity.status)
        .bind(entity.chunk_count)
        .bind(&entity.failure_reason)
        .bind(&entity.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, DataError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, DataError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(total as u64)
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn create(&self, new_document: NewDocument) -> Result<Document, DataError> {
        sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (
                id, tenant_id, owner_user_id, filename, content_type, size_bytes,
                status, chunk_count, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', 0, $7, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_document.tenant_id)
        .bind(new_document.owner_user_id)
        .bind(&new_document.filename)
        .bind(&new_document.content_type)
        .bind(new_document.size_bytes)
        .bind(&new_document.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_by_tenant_paged(&self, tenant_id: Uuid, pageable: &Pageable) -> Result<Page<Document>, DataError> {
        let content = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE tenant_id = $1 ORDER BY created_at LIMIT $2 OFFSET $3",
        )
        .bind(tenant_id)
        .bind(pageable.size as i64)
        .bind(pageable.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

        Ok(Page::new(content, pageable, total as u64))
    }

    async fn count_by_tenant(&self, tenant_id: Uuid) -> Result<i64, DataError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn total_storage_bytes(&self, tenant_id: Uuid) -> Result<i64, DataError> {
        sqlx::query_scalar("SELECT COALESCE(SUM(size_bytes), 0) FROM documents WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn set_status(&self, id: Uuid, status: DocumentStatus, failure_reason: Option<String>) -> Result<Document, DataError> {
        sqlx::query_as::<_, Document>(
            "UPDATE documents SET status = $2, failure_reason = $3, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(failure_reason)
        .fetch_one(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
    }

    async fn set_chunk_count(&self, id: Uuid, chunk_count: i32) -> Result<Document, DataError> {
        sqlx::query_as::<_, Document>(
            "UPDATE documents SET chunk_count = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(chunk_count)
        .fetch_one(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
    }
}

#[derive(Clone)]
pub struct PgChunkRepository {
    pool: PgPool,
}

impl PgChunkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChunkRepository for PgChunkRepository {
    async fn insert_batch(&self, chunks: &[StoredChunk]) -> Result<(), DataError> {
        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, tenant_id, sequence, start_offset, end_offset, content, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(chunk.id)
            .bind(chunk.document_id)
            .bind(chunk.tenant_id)
            .bind(chunk.sequence)
            .bind(chunk.start_offset)
            .bind(chunk.end_offset)
            .bind(&chunk.content)
            .bind(chunk.created_at)
            .execute(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        }
        tx.commit().await.map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_by_document(&self, document_id: Uuid) -> Result<Vec<StoredChunk>, DataError> {
        sqlx::query_as::<_, StoredChunk>("SELECT * FROM chunks WHERE document_id = $1 ORDER BY sequence")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<(), DataError> {
        sqlx::query("DELETE FROM chunks WHERE document_id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(())
    }
}
