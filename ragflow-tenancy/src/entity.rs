use fabric_data::Entity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TenantStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategyName {
    FixedSize,
    Sentence,
    Semantic,
}

impl From<ChunkingStrategyName> for ragflow_core::ChunkingStrategy {
    fn from(name: ChunkingStrategyName) -> Self {
        match name {
            ChunkingStrategyName::FixedSize => ragflow_core::ChunkingStrategy::FixedSize,
            ChunkingStrategyName::Sentence => ragflow_core::ChunkingStrategy::Sentence,
            ChunkingStrategyName::Semantic => ragflow_core::ChunkingStrategy::Semantic,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub status: TenantStatus,
    pub max_documents: i64,
    pub max_storage_bytes: i64,
    pub chunk_size: i32,
    pub chunk_overlap: i32,
    pub chunking_strategy: ChunkingStrategyName,
    pub embedding_model: String,
    pub llm_model: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Tenant {
    pub fn chunking_policy(&self) -> ragflow_core::ChunkingPolicy {
        ragflow_core::ChunkingPolicy {
            strategy: self.chunking_strategy.into(),
            max_chunk_size: self.chunk_size as usize,
            overlap: self.chunk_overlap as usize,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TenantStatus::Active)
    }
}

impl Entity for Tenant {
    type Id = Uuid;

    fn table_name() -> &'static str {
        "tenants"
    }

    fn id_column() -> &'static str {
        "id"
    }

    fn columns() -> &'static [&'static str] {
        &[
            "id",
            "slug",
            "status",
            "max_documents",
            "max_storage_bytes",
            "chunk_size",
            "chunk_overlap",
            "chunking_strategy",
            "embedding_model",
            "llm_model",
            "created_at",
            "updated_at",
        ]
    }

    fn id(&self) -> &Uuid {
        &self.id
    }
}

/// Fields accepted when an admin creates a tenant; id/timestamps are assigned
/// by the repository.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub slug: String,
    pub max_documents: i64,
    pub max_storage_bytes: i64,
    pub chunk_size: i32,
    pub chunk_overlap: i32,
    pub chunking_strategy: ChunkingStrategyName,
    pub embedding_model: String,
    pub llm_model: String,
}
