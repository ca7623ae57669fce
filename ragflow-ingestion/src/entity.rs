use fabric_data::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Content types the extractor pipeline knows how to handle.
pub const SUPPORTED_CONTENT_TYPES: &[&str] =
    &["pdf", "docx", "doc", "txt", "md", "html", "rtf", "odt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_user_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: DocumentStatus,
    pub chunk_count: i32,
    pub failure_reason: Option<String>,
    pub metadata: Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Entity for Document {
    type Id = Uuid;

    fn table_name() -> &'static str {
        "documents"
    }

    fn id_column() -> &'static str {
        "id"
    }

    fn columns() -> &'static [&'static str] {
        &[
            "id",
            "tenant_id",
            "owner_user_id",
            "filename",
            "content_type",
            "size_bytes",
            "status",
            "chunk_count",
            "failure_reason",
            "metadata",
            "created_at",
            "updated_at",
        ]
    }

    fn id(&self) -> &Uuid {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub tenant_id: Uuid,
    pub owner_user_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub metadata: Value,
}

/// A persisted chunk, distinct from `ragflow_core::chunking::Chunk` (the
/// pure value the splitter produces) by also carrying its tenant/document
/// ownership and an assigned id for the vector record to key off of.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    pub sequence: i32,
    pub start_offset: i32,
    pub end_offset: i32,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Entity for StoredChunk {
    type Id = Uuid;

    fn table_name() -> &'static str {
        "chunks"
    }

    fn id_column() -> &'static str {
        "id"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "document_id", "tenant_id", "sequence", "start_offset", "end_offset", "content", "created_at"]
    }

    fn id(&self) -> &Uuid {
        &self.id
    }
}
