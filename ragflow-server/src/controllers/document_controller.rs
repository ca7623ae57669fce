use std::sync::Arc;

use fabric::prelude::*;
use ragflow_core::RagError;
use ragflow_ingestion::repository::DocumentRepository;
use ragflow_ingestion::{Document, IngestionService};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::guards::{TenantHeaderGuard, TenantRateLimitGuard};
use crate::identity::RagIdentity;
use crate::state::AppState;

#[derive(FromMultipart)]
pub struct UploadForm {
    pub file: UploadedFile,
    pub metadata: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateDocumentRequest {
    filename: Option<String>,
    metadata: Option<Value>,
}

/// The list view's lighter-weight row shape — omits free-form `metadata`
/// and `failure_reason`, which only matter once a caller drills into a
/// single document.
#[derive(Serialize)]
pub struct DocumentSummary {
    id: Uuid,
    filename: String,
    content_type: String,
    size_bytes: i64,
    status: String,
    chunk_count: i32,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            content_type: doc.content_type.clone(),
            size_bytes: doc.size_bytes,
            status: format!("{:?}", doc.status).to_uppercase(),
            chunk_count: doc.chunk_count,
            created_at: doc.created_at,
        }
    }
}

#[derive(Serialize)]
struct StatsResponse {
    total_documents: u64,
    storage_bytes: i64,
}

#[derive(Controller)]
#[controller(path = "/api/v1/documents", state = AppState)]
pub struct DocumentController {
    #[inject]
    ingestion: Arc<IngestionService>,
    #[inject]
    documents: Arc<dyn DocumentRepository>,
}

#[routes]
impl DocumentController {
    #[post("/upload")]
    #[guard(TenantHeaderGuard)]
    #[guard(TenantRateLimitGuard)]
    async fn upload(
        &self,
        #[inject(identity)] identity: RagIdentity,
        TypedMultipart(form): TypedMultipart<UploadForm>,
    ) -> Result<(StatusCode, Json<Document>), RagError> {
        let metadata: Value = match form.metadata {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| RagError::InvalidArgument(format!("invalid metadata json: {e}")))?,
            None => Value::Null,
        };
        let filename = form.file.file_name.clone().unwrap_or_else(|| "upload".to_string());
        let content_type = form.file.content_type.clone().unwrap_or_else(|| "application/octet-stream".to_string());
        let document = self
            .ingestion
            .upload(identity.tenant_id, identity.user_id, form.file.data, filename, content_type, metadata)
            .await?;
        Ok((StatusCode::CREATED, Json(document)))
    }

    #[get("/stats")]
    #[guard(TenantHeaderGuard)]
    async fn stats(&self, #[inject(identity)] identity: RagIdentity) -> Result<Json<StatsResponse>, RagError> {
        let total_documents = self.documents.count_by_tenant(identity.tenant_id).await.map_err(map_data_err)?;
        let storage_bytes = self.documents.total_storage_bytes(identity.tenant_id).await.map_err(map_data_err)?;
        Ok(Json(StatsResponse { total_documents, storage_bytes }))
    }

    #[get("/{id}")]
    #[guard(TenantHeaderGuard)]
    async fn get_by_id(&self, Path(id): Path<Uuid>, #[inject(identity)] identity: RagIdentity) -> Result<Json<Document>, RagError> {
        let document = self.ingestion.get(identity.tenant_id, id).await?;
        Ok(Json(document))
    }

    #[get("/")]
    #[guard(TenantHeaderGuard)]
    async fn list(
        &self,
        Query(pageable): Query<Pageable>,
        #[inject(identity)] identity: RagIdentity,
    ) -> Result<Json<Page<DocumentSummary>>, RagError> {
        let page = self.documents.find_by_tenant_paged(identity.tenant_id, &pageable).await.map_err(map_data_err)?;
        let content = page.content.iter().map(DocumentSummary::from).collect();
        Ok(Json(Page {
            content,
            page: page.page,
            size: page.size,
            total_elements: page.total_elements,
            total_pages: page.total_pages,
        }))
    }

    #[put("/{id}")]
    #[guard(TenantHeaderGuard)]
    async fn update(
        &self,
        Path(id): Path<Uuid>,
        #[inject(identity)] identity: RagIdentity,
        Json(body): Json<UpdateDocumentRequest>,
    ) -> Result<Json<Document>, RagError> {
        let mut document = self.ingestion.get(identity.tenant_id, id).await?;
        if let Some(filename) = body.filename {
            document.filename = filename;
        }
        if let Some(metadata) = body.metadata {
            document.metadata = metadata;
        }
        let saved = self.documents.save(&document).await.map_err(map_data_err)?;
        Ok(Json(saved))
    }

    #[delete("/{id}")]
    #[guard(TenantHeaderGuard)]
    async fn delete(&self, Path(id): Path<Uuid>, #[inject(identity)] identity: RagIdentity) -> Result<StatusCode, RagError> {
        self.ingestion.delete(identity.tenant_id, id).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}

fn map_data_err(err: fabric_data::DataError) -> RagError {
    RagError::Internal(err.to_string())
}
