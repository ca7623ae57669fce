use std::sync::Arc;
use std::time::Duration;

use fabric::fabric_scheduler::Scheduler;
use fabric::prelude::*;
use ragflow_core::{InMemoryAuditSink, RagError};
use ragflow_embedding::{EmbeddingBatcher, EmbeddingCache, EmbeddingService, MockEmbeddingProvider};
use ragflow_eventbus::{topics, InProcessEventBus};
use ragflow_gateway::CircuitBreaker;
use ragflow_identity::{IdentityService, KeyRing, RefreshTokenStore, TokenService};
use ragflow_ingestion::{IngestionService, PgChunkRepository, PgDocumentRepository, PlainTextExtractor};
use ragflow_rag::{ConversationLock, ConversationStore, MockLlmProvider, OrchestratorConfig, RagOrchestrator, ResponseCache};
use ragflow_storage::{FilesystemBlobStore, InMemoryKvStore, PgVectorIndex};
use ragflow_tenancy::{PgTenantRepository, TenantService};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::RwLock;

mod controllers;
mod guards;
mod identity;
mod occupancy;
mod state;

use controllers::auth_controller::AuthController;
use controllers::document_controller::DocumentController;
use controllers::embeddings_controller::EmbeddingsController;
use controllers::jwks_controller::JwksController;
use controllers::rag_controller::RagController;
use controllers::scheduled_jobs::ScheduledJobs;
use occupancy::DeferredOccupancyCheck;
use state::AppState;

/// Every recognized key in §6's environment/config table is read through
/// `FabricConfig` rather than `std::env::var` directly — profile overlay and
/// `APP_*`-style env overrides apply uniformly, with no component bypassing
/// the layer.
fn config_duration_secs(config: &FabricConfig, key: &str, default_secs: i64) -> Duration {
    Duration::from_secs(config.get_or::<i64>(key, default_secs).max(0) as u64)
}

#[tokio::main]
async fn main() {
    fabric_core::init_tracing();

    let profile = std::env::var("RAGFLOW_PROFILE").unwrap_or_else(|_| "dev".to_string());
    let config = FabricConfig::load(&profile).unwrap_or_else(|_| FabricConfig::empty());

    let database_url = config.get_or::<String>("app.database.url", "postgres://localhost/ragflow".to_string());
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let kv: Arc<dyn ragflow_storage::KvStore> = Arc::new(InMemoryKvStore::new());
    let blob: Arc<dyn ragflow_storage::BlobStore> =
        Arc::new(FilesystemBlobStore::new(config.get_or::<String>("app.blob.root", "./data/blobs".to_string())));
    let audit: Arc<dyn ragflow_core::AuditSink> = Arc::new(InMemoryAuditSink::new());
    let bus = Arc::new(InProcessEventBus::new());
    let vectors: Arc<dyn ragflow_storage::VectorIndex> = Arc::new(PgVectorIndex::new(pool.clone()));

    let key_ring = Arc::new(RwLock::new(KeyRing::new(2)));
    let tokens = Arc::new(TokenService::new(
        key_ring.clone(),
        config.get_or::<String>("app.auth.issuer", "ragflow".to_string()),
        config.get_or::<String>("app.auth.audience", "ragflow-api".to_string()),
        config_duration_secs(&config, "app.auth.access_ttl_secs", 900),
        config_duration_secs(&config, "app.auth.refresh_ttl_secs", 1_209_600),
    ));
    let refresh_store =
        Arc::new(RefreshTokenStore::new(kv.clone(), config_duration_secs(&config, "app.auth.refresh_ttl_secs", 1_209_600)));
    let users = Arc::new(ragflow_identity::PgUserRepository::new(pool.clone()));
    let identity = Arc::new(IdentityService::new(users, tokens.clone(), refresh_store, audit.clone()));

    let occupancy_check = Arc::new(DeferredOccupancyCheck::new());
    let tenants_repo = Arc::new(PgTenantRepository::new(pool.clone()));
    let tenants = Arc::new(TenantService::new(tenants_repo, occupancy_check.clone(), audit.clone()));

    let documents = Arc::new(PgDocumentRepository::new(pool.clone()));
    let chunks = Arc::new(PgChunkRepository::new(pool.clone()));
    let max_file_size_bytes = config.get_or::<i64>("app.ingestion.max_file_size_bytes", 20 * 1024 * 1024);
    let ingestion = Arc::new(IngestionService::new(
        documents.clone(),
        chunks.clone(),
        blob.clone(),
        kv.clone(),
        vectors.clone(),
        bus.clone(),
        tenants.clone(),
        Arc::new(PlainTextExtractor),
        audit.clone(),
        max_file_size_bytes,
    ));
    occupancy_check.set(ingestion.clone());

    let embedding_model = config.get_or::<String>("app.embedding.model", "text-embedding-3-small".to_string());
    let embedding_provider = Arc::new(MockEmbeddingProvider::new(1536, vec![embedding_model]));
    let batcher = EmbeddingBatcher::new(embedding_provider, 16, Duration::from_millis(20));
    let embedding_cache = EmbeddingCache::new(kv.clone());
    let embeddings = Arc::new(EmbeddingService::new(batcher, embedding_cache, vectors.clone(), bus.clone(), kv.clone()));
    embeddings.clone().register().await;

    register_chunk_lifecycle_consumers(&bus, ingestion.clone()).await;

    let llm_model = config.get_or::<String>("app.llm.model", "gpt-4o-mini".to_string());
    let llm = Arc::new(MockLlmProvider::new(vec![llm_model]));
    let conversations = ConversationStore::new(kv.clone(), Duration::from_secs(3600));
    let response_cache = ResponseCache::new(kv.clone());
    let rag = Arc::new(RagOrchestrator::new(
        tenants.clone(),
        embeddings.clone(),
        llm,
        conversations.clone(),
        ConversationLock::new(),
        response_cache,
        OrchestratorConfig::default(),
    ));

    let embedding_breaker = Arc::new(CircuitBreaker::new(5, Duration::from_secs(30), Duration::from_secs(30)));
    let llm_breaker = Arc::new(CircuitBreaker::new(5, Duration::from_secs(30), Duration::from_secs(30)));

    let state = AppState {
        config: config.clone(),
        identity,
        tenants,
        ingestion,
        embeddings,
        rag,
        conversations,
        documents,
        chunks,
        key_ring,
        kv,
        blob,
        embedding_breaker,
        llm_breaker,
    };

    let bind_addr = config.get_or::<String>("app.server.bind_addr", "0.0.0.0:3000".to_string());

    AppBuilder::new()
        .plugin(Scheduler)
        .with_state(state)
        .with_config(config)
        .with(Health)
        .with(Cors::permissive())
        .with(Tracing)
        .with(ErrorHandling)
        .with(SecureHeaders::default())
        .with(RequestIdPlugin)
        .register_controller::<AuthController>()
        .register_controller::<DocumentController>()
        .register_controller::<RagController>()
        .register_controller::<EmbeddingsController>()
        .register_controller::<JwksController>()
        .register_controller::<ScheduledJobs>()
        .serve(&bind_addr)
        .await
        .unwrap();
}

#[derive(serde::Deserialize)]
struct ChunkIndexedPayload {
    tenant_id: uuid::Uuid,
    document_id: uuid::Uuid,
}

#[derive(serde::Deserialize)]
struct ChunkFailedPayload {
    tenant_id: uuid::Uuid,
    document_id: uuid::Uuid,
    reason: String,
}

/// `chunks.indexed` and `chunk.failed` drive document-status transitions
/// that live on `IngestionService`. Wired directly rather than through the
/// `#[consumer]` macro, since that macro targets a bus shape this in-process
/// bus doesn't expose.
async fn register_chunk_lifecycle_consumers(bus: &Arc<InProcessEventBus>, ingestion: Arc<IngestionService>) {
    let indexed_ingestion = ingestion.clone();
    bus.subscribe_fn(topics::CHUNKS_INDEXED, move |message| {
        let ingestion = indexed_ingestion.clone();
        async move {
            let payload: ChunkIndexedPayload = serde_json::from_value(message.payload)
                .map_err(|e| ragflow_eventbus::BusError::HandlerFailed(format!("malformed chunks.indexed payload: {e}")))?;
            ingestion
                .handle_chunk_indexed(payload.tenant_id, payload.document_id)
                .await
                .map_err(|e: RagError| ragflow_eventbus::BusError::HandlerFailed(e.to_string()))
        }
    })
    .await;

    bus.subscribe_fn(topics::CHUNK_FAILED, move |message| {
        let ingestion = ingestion.clone();
        async move {
            let payload: ChunkFailedPayload = serde_json::from_value(message.payload)
                .map_err(|e| ragflow_eventbus::BusError::HandlerFailed(format!("malformed chunk.failed payload: {e}")))?;
            ingestion
                .handle_chunk_failed(payload.tenant_id, payload.document_id, payload.reason)
                .await
                .map_err(|e: RagError| ragflow_eventbus::BusError::HandlerFailed(e.to_string()))
        }
    })
    .await;
}
