use std::sync::Arc;

use fabric::prelude::*;
use futures_util::future::try_join_all;
use ragflow_core::RagError;
use ragflow_embedding::EmbeddingService;
use ragflow_storage::SearchFilters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::guards::{TenantHeaderGuard, TenantRateLimitGuard};
use crate::identity::RagIdentity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct GenerateRequest {
    texts: Vec<String>,
    model: String,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    embedding: Vec<f32>,
    top_k: usize,
    #[serde(default)]
    filters: SearchFiltersRequest,
}

#[derive(Deserialize, Default)]
pub struct SearchFiltersRequest {
    document_ids: Option<Vec<Uuid>>,
}

#[derive(Serialize)]
pub struct SearchResult {
    chunk_id: Uuid,
    score: f32,
    metadata: Value,
}

#[derive(Serialize)]
pub struct SearchResponse {
    results: Vec<SearchResult>,
}

/// Internal, tenant-scoped endpoints used by the embedding pipeline's own
/// callers (§6 lists these as "internal") rather than by end-user clients —
/// still behind the same bearer + tenant-header guards as the public surface.
#[derive(Controller)]
#[controller(path = "/api/v1/embeddings", state = AppState)]
pub struct EmbeddingsController {
    #[inject]
    embeddings: Arc<EmbeddingService>,
}

#[routes]
impl EmbeddingsController {
    #[post("/generate")]
    #[guard(TenantHeaderGuard)]
    #[guard(TenantRateLimitGuard)]
    async fn generate(
        &self,
        #[inject(identity)] identity: RagIdentity,
        Json(body): Json<GenerateRequest>,
    ) -> Result<Json<GenerateResponse>, RagError> {
        let tenant_id = identity.tenant_id;
        let model = body.model;
        let futures = body.texts.iter().map(|text| self.embeddings.embed_query(tenant_id, text, &model));
        let embeddings = try_join_all(futures).await?;
        Ok(Json(GenerateResponse { embeddings }))
    }

    #[post("/search")]
    #[guard(TenantHeaderGuard)]
    #[guard(TenantRateLimitGuard)]
    async fn search(
        &self,
        #[inject(identity)] identity: RagIdentity,
        Json(body): Json<SearchRequest>,
    ) -> Result<Json<SearchResponse>, RagError> {
        let filters = SearchFilters { document_ids: body.filters.document_ids };
        let scored = self.embeddings.search(identity.tenant_id, &body.embedding, body.top_k, &filters).await?;
        let results = scored.into_iter().map(|s| SearchResult { chunk_id: s.chunk_id, score: s.score, metadata: s.metadata }).collect();
        Ok(Json(SearchResponse { results }))
    }
}
