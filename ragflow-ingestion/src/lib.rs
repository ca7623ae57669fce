//! # ragflow-ingestion — document upload, extraction, chunking, and cascade delete
//!
//! Owns the PENDING → PROCESSING → COMPLETED/FAILED document lifecycle.
//! HTTP routing for `/documents/*` lives in `ragflow-server`; the periodic
//! worker that drives `process_document` and the `#[consumer]` that reacts
//! to `chunks.indexed`/`chunk.failed` are also wired there, against this
//! crate's [`service::IngestionService`].

pub mod entity;
pub mod error;
pub mod extractor;
pub mod repository;
pub mod service;

pub use entity::{Document, DocumentStatus, NewDocument, StoredChunk, SUPPORTED_CONTENT_TYPES};
pub use error::IngestionError;
pub use extractor::{PlainTextExtractor, TextExtractor};
pub use repository::{ChunkRepository, DocumentRepository, PgChunkRepository, PgDocumentRepository};
pub use service::IngestionService;
