//! # ragflow-embedding — chunk embedding, vector search, and the embedding cache
//!
//! Consumes `chunks.created`, turns text into vectors via a batched,
//! cache-fronted [`provider::EmbeddingProvider`], and serves query-time
//! embedding and search. HTTP routing for `/embeddings/*` and the call to
//! [`service::EmbeddingService::register`] at startup both live in
//! `ragflow-server`.

pub mod batcher;
pub mod cache;
pub mod error;
pub mod provider;
pub mod service;

pub use batcher::EmbeddingBatcher;
pub use cache::{fingerprint, EmbeddingCache};
pub use error::EmbeddingError;
pub use provider::{EmbeddingProvider, MockEmbeddingProvider};
pub use service::EmbeddingService;
