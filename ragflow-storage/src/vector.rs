//! Vector index adapter. Every vector lives in the namespace `tenant:<tenant_id>`;
//! there is no "global" namespace and no operation accepts an unscoped search —
//! the namespace argument is mandatory on every method, not optional.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk_id: Uuid,
    pub embedding: Vec<f32>,
    pub model_name: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: Uuid,
    pub score: f32,
    pub metadata: Value,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub document_ids: Option<Vec<Uuid>>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector for `chunk_id` in `tenant_id`'s namespace.
    /// `dimension` mismatch against the model's declared dimension is a
    /// programmer error and must panic rather than silently truncate.
    async fn upsert(&self, tenant_id: Uuid, record: VectorRecord) -> Result<(), StorageError>;

    async fn search(
        &self,
        tenant_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredChunk>, StorageError>;

    async fn delete_for_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<(), StorageError>;
}

/// Postgres + `pgvector` backed index. Table layout (one row per chunk):
/// `(tenant_id uuid, document_id uuid, chunk_id uuid primary key, embedding vector,
///   model_name text, dimension int, created_at timestamptz, updated_at timestamptz, metadata jsonb)`.
pub struct PgVectorIndex {
    pool: PgPool,
}

impl PgVectorIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn upsert(&self, tenant_id: Uuid, record: VectorRecord) -> Result<(), StorageError> {
        assert_eq!(
            record.embedding.len(),
            record.dimension,
            "embedding length must match declared dimension for model {}",
            record.model_name
        );
        let embedding = pgvector::Vector::from(record.embedding);
        sqlx::query(
            r#"
            INSERT INTO vector_records
                (tenant_id, chunk_id, embedding, model_name, dimension, created_at, updated_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (chunk_id) DO UPDATE SET
                embedding = EXCLUDED.embedding,
                model_name = EXCLUDED.model_name,
                dimension = EXCLUDED.dimension,
                updated_at = EXCLUDED.updated_at,
                metadata = EXCLUDED.metadata
            "#,
        )
        .bind(tenant_id)
        .bind(record.chunk_id)
        .bind(embedding)
        .bind(&record.model_name)
        .bind(record.dimension as i32)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(&record.metadata)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: Uuid,
        embedding: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredChunk>, StorageError> {
        let query_vec = pgvector::Vector::from(embedding.to_vec());
        let rows = match &filters.document_ids {
            Some(doc_ids) => {
                sqlx::query_as::<_, (Uuid, f32, Value)>(
                    r#"
                    SELECT chunk_id, (embedding <=> $2) AS score, metadata
                    FROM vector_records
                    WHERE tenant_id = $1 AND document_id = ANY($3)
                    ORDER BY embedding <=> $2
                    LIMIT $4
                    "#,
                )
                .bind(tenant_id)
                .bind(&query_vec)
                .bind(doc_ids)
                .bind(top_k as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, (Uuid, f32, Value)>(
                    r#"
                    SELECT chunk_id, (embedding <=> $2) AS score, metadata
                    FROM vector_records
                    WHERE tenant_id = $1
                    ORDER BY embedding <=> $2
                    LIMIT $3
                    "#,
                )
                .bind(tenant_id)
                .bind(&query_vec)
                .bind(top_k as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .map(|(chunk_id, score, metadata)| ScoredChunk { chunk_id, score, metadata })
            .collect())
    }

    async fn delete_for_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM vector_records WHERE tenant_id = $1 AND document_id = $2")
            .bind(tenant_id)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
