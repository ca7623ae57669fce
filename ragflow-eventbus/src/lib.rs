//! # ragflow-eventbus — durable, ordered pub/sub between pipeline stages
//!
//! Wires the ingestion pipeline to the embedding pipeline and back: a
//! publisher accepts `(topic, key, payload)`, a consumer is delivered
//! messages in per-key order, and a message that fails processing
//! `max_attempts` times is routed to `<topic>.dead-letter` rather than
//! dropped or retried forever.

pub mod bus;
pub mod error;
pub mod message;

pub use bus::{InProcessEventBus, MessageHandler, RetryPolicy};
pub use error::BusError;
pub use message::{dead_letter_topic, BusMessage, DeadLetter};

/// Canonical topic names used across the ingestion/embedding boundary.
pub mod topics {
    pub const CHUNKS_CREATED: &str = "chunks.created";
    pub const CHUNKS_INDEXED: &str = "chunks.indexed";
    pub const DOCUMENT_COMPLETED: &str = "document.completed";
    pub const DOCUMENT_FAILED: &str = "document.failed";
    pub const CHUNK_FAILED: &str = "chunk.failed";
}
