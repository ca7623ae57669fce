//! # ragflow-storage — tenant-scoped storage adapters
//!
//! Thin, swappable backends behind narrow traits: blob storage for document
//! bytes, a KV/cache store for everything short-lived and tenant-prefixed,
//! and a vector index for chunk embeddings. Every method takes the tenant id
//! explicitly rather than relying on an ambient context, so a caller can
//! never accidentally search or read across tenants.

pub mod blob;
pub mod error;
pub mod kv;
pub mod vector;

pub use blob::{BlobStore, FilesystemBlobStore};
pub use error::StorageError;
pub use kv::{tenant_key, InMemoryKvStore, KvStore};
pub use vector::{PgVectorIndex, ScoredChunk, SearchFilters, VectorIndex, VectorRecord};
