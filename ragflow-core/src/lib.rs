//! # ragflow-core — shared types for the RAG platform
//!
//! Everything every other `ragflow-*` crate depends on: the tenant-scoped
//! request context, the uniform error taxonomy, audit logging, and the
//! chunking algorithms used at ingestion time.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TenantContext`] | Validated tenant/user/role triple threaded through every call |
//! | [`RagError`] | Uniform error enum, one variant per wire error code |
//! | [`AuditSink`] | Write-once audit trail for status transitions |
//! | [`ChunkingPolicy`] | Strategy + parameters for splitting document text into chunks |

pub mod audit;
pub mod chunking;
pub mod context;
pub mod error;

pub use audit::{AuditEntry, AuditSink, InMemoryAuditSink, NewAuditEntry};
pub use chunking::{chunk_text, Chunk, ChunkingPolicy, ChunkingStrategy};
pub use context::{Role, TenantContext};
pub use error::RagError;

/// Re-exports of the most commonly used domain types.
pub mod prelude {
    pub use crate::{
        AuditEntry, AuditSink, Chunk, ChunkingPolicy, ChunkingStrategy, NewAuditEntry, RagError,
        Role, TenantContext,
    };
}
