//! The composition root's shared application state. Every `#[inject]`
//! field on a controller is cloned out of here by field name, so field
//! names here are load-bearing — see `fabric-macros`' extractor codegen.

use std::sync::Arc;

use fabric_core::http::extract::FromRef;
use fabric_core::FabricConfig;
use ragflow_embedding::EmbeddingService;
use ragflow_gateway::CircuitBreaker;
use ragflow_identity::{IdentityService, KeyRing};
use ragflow_ingestion::repository::{ChunkRepository, DocumentRepository};
use ragflow_ingestion::IngestionService;
use ragflow_rag::{ConversationStore, RagOrchestrator};
use ragflow_storage::{BlobStore, KvStore};
use ragflow_tenancy::TenantService;
use tokio::sync::RwLock;

/// Rate-limit buckets are tenant-scoped (one KV namespace per tenant), so
/// `ragflow_gateway::KvRateLimitBackend` is built fresh per request from
/// `kv` + the caller's tenant id rather than stored ready-made here.
#[derive(Clone)]
pub struct AppState {
    pub config: FabricConfig,
    pub identity: Arc<IdentityService>,
    pub tenants: Arc<TenantService>,
    pub ingestion: Arc<IngestionService>,
    pub embeddings: Arc<EmbeddingService>,
    pub rag: Arc<RagOrchestrator>,
    pub conversations: ConversationStore,
    pub documents: Arc<dyn DocumentRepository>,
    pub chunks: Arc<dyn ChunkRepository>,
    pub key_ring: Arc<RwLock<KeyRing>>,
    pub kv: Arc<dyn KvStore>,
    pub blob: Arc<dyn BlobStore>,
    pub embedding_breaker: Arc<CircuitBreaker>,
    pub llm_breaker: Arc<CircuitBreaker>,
}

impl FromRef<AppState> for FabricConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<IdentityService> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}
