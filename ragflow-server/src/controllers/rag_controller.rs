use std::convert::Infallible;
use std::sync::Arc;

use fabric::prelude::*;
use fabric_core::http::response::SseEvent;
use ragflow_core::RagError;
use ragflow_ingestion::repository::{ChunkRepository, DocumentRepository};
use ragflow_ingestion::IngestionService;
use ragflow_rag::{Citation, Conversation, QueryMetrics, QueryOptions, RagOrchestrator, StreamEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::guards::{TenantHeaderGuard, TenantRateLimitGuard};
use crate::identity::RagIdentity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct QueryRequest {
    /// Carried for wire compatibility with callers that still send it;
    /// the authenticated caller's own tenant claim is what actually scopes
    /// the query, never this field.
    #[allow(dead_code)]
    tenant_id: Option<Uuid>,
    query: String,
    top_k: Option<usize>,
    include_context: Option<bool>,
    conversation_id: Option<Uuid>,
    model: Option<String>,
    max_tokens: Option<usize>,
}

impl QueryRequest {
    fn options(&self) -> QueryOptions {
        let defaults = QueryOptions::default();
        QueryOptions {
            top_k: self.top_k.unwrap_or(defaults.top_k),
            include_context: self.include_context.unwrap_or(defaults.include_context),
            model: self.model.clone(),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            ..defaults
        }
    }
}

#[derive(Serialize)]
pub struct Source {
    file_name: String,
    relevance_score: f32,
    excerpt: String,
}

#[derive(Serialize)]
pub struct QueryResponsePayload {
    response: String,
    sources: Vec<Source>,
    metrics: QueryMetrics,
}

const EXCERPT_LEN: usize = 240;

#[derive(Controller)]
#[controller(path = "/api/v1/rag", state = AppState)]
pub struct RagController {
    #[inject]
    rag: Arc<RagOrchestrator>,
    #[inject]
    ingestion: Arc<IngestionService>,
    #[inject]
    chunks: Arc<dyn ChunkRepository>,
    #[inject]
    documents: Arc<dyn DocumentRepository>,
    #[inject]
    conversations: ragflow_rag::ConversationStore,
}

#[routes]
impl RagController {
    #[post("/query")]
    #[guard(TenantHeaderGuard)]
    #[guard(TenantRateLimitGuard)]
    async fn query(
        &self,
        #[inject(identity)] identity: RagIdentity,
        Json(body): Json<QueryRequest>,
    ) -> Result<Json<QueryResponsePayload>, RagError> {
        let options = body.options();
        let response = self
            .rag
            .query(identity.tenant_id, identity.user_id, body.conversation_id, &body.query, options)
            .await?;
        let sources = self.build_sources(identity.tenant_id, &response.citations).await;
        Ok(Json(QueryResponsePayload { response: response.answer, sources, metrics: response.metrics }))
    }

    #[sse("/query/stream")]
    #[guard(TenantHeaderGuard)]
    #[guard(TenantRateLimitGuard)]
    async fn query_stream(
        &self,
        #[inject(identity)] identity: RagIdentity,
        Json(body): Json<QueryRequest>,
    ) -> Result<impl futures_core::Stream<Item = Result<SseEvent, Infallible>> + Send, RagError> {
        let options = body.options();
        let events = self
            .rag
            .query_stream(identity.tenant_id, identity.user_id, body.conversation_id, &body.query, options)
            .await?;

        let tenant_id = identity.tenant_id;
        let documents = self.documents.clone();
        let chunks = self.chunks.clone();

        Ok(async_stream::stream! {
            use futures_util::StreamExt;
            let mut events = std::pin::pin!(events);
            while let Some(event) = events.next().await {
                match event {
                    StreamEvent::Token(text) => {
                        yield Ok(SseEvent::default().event("delta").data(text));
                    }
                    StreamEvent::Done { citations, metrics } => {
                        let sources = build_sources(&documents, &chunks, tenant_id, &citations).await;
                        let citations_payload = json!({ "sources": sources }).to_string();
                        yield Ok(SseEvent::default().event("citations").data(citations_payload));
                        let done_payload = serde_json::to_string(&metrics).unwrap_or_else(|_| "{}".to_string());
                        yield Ok(SseEvent::default().event("done").data(done_payload));
                    }
                    StreamEvent::Error { code, message } => {
                        let payload = json!({ "code": code, "message": message }).to_string();
                        yield Ok(SseEvent::default().event("error").data(payload));
                    }
                }
            }
        })
    }

    #[get("/conversations/{id}")]
    #[guard(TenantHeaderGuard)]
    async fn get_conversation(
        &self,
        Path(id): Path<Uuid>,
        #[inject(identity)] identity: RagIdentity,
    ) -> Result<Json<Conversation>, RagError> {
        self.conversations
            .get(identity.tenant_id, id)
            .await
            .map(Json)
            .ok_or_else(|| RagError::NotFound("conversation not found".to_string()))
    }

    #[delete("/conversations/{id}")]
    #[guard(TenantHeaderGuard)]
    async fn delete_conversation(
        &self,
        Path(id): Path<Uuid>,
        #[inject(identity)] identity: RagIdentity,
    ) -> Result<StatusCode, RagError> {
        self.conversations.delete(identity.tenant_id, id).await.map_err(|e| RagError::Internal(e.to_string()))?;
        Ok(StatusCode::NO_CONTENT)
    }
}

impl RagController {
    async fn build_sources(&self, tenant_id: Uuid, citations: &[Citation]) -> Vec<Source> {
        build_sources(&self.documents, &self.chunks, tenant_id, citations).await
    }
}

/// `Citation` only carries `{chunk_id, document_id, score}` (conversation
/// history stays small); the file name and excerpt a caller sees are
/// recovered here with one document lookup and one chunk scan per citation.
async fn build_sources(
    documents: &Arc<dyn DocumentRepository>,
    chunks: &Arc<dyn ChunkRepository>,
    tenant_id: Uuid,
    citations: &[Citation],
) -> Vec<Source> {
    let mut sources = Vec::with_capacity(citations.len());
    for citation in citations {
        let file_name = match documents.find_by_id(&citation.document_id).await {
            Ok(Some(doc)) if doc.tenant_id == tenant_id => doc.filename,
            _ => continue,
        };
        let excerpt = match chunks.find_by_document(citation.document_id).await {
            Ok(stored) => stored
                .into_iter()
                .find(|c| c.id == citation.chunk_id)
                .map(|c| truncate(&c.content, EXCERPT_LEN))
                .unwrap_or_default(),
            Err(_) => String::new(),
        };
        sources.push(Source { file_name, relevance_score: citation.score, excerpt });
    }
    sources
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_text_untouched() {
        assert_eq!(truncate("short", 240), "short");
    }

    #[test]
    fn truncate_clips_long_text_with_ellipsis() {
        let long = "a".repeat(300);
        let result = truncate(&long, 240);
        assert_eq!(result.chars().count(), 241);
        assert!(result.ends_with('…'));
    }
}
