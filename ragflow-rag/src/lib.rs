//! # ragflow-rag — conversation memory and retrieval-augmented generation
//!
//! Owns the query pipeline from §4.5: validation, response caching,
//! conversation load/summary rollover, query rewriting, retrieval +
//! reranking, context assembly, prompt composition, LLM generation (sync or
//! streamed), citation selection, and post-query bookkeeping. HTTP routing
//! for `/rag/*` and the SSE adaptation of [`entity::StreamEvent`] both live
//! in `ragflow-server`, not here.

pub mod conversation;
pub mod entity;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod rerank;
pub mod response_cache;
pub mod service;

pub use conversation::{ConversationLock, ConversationStore};
pub use entity::{Citation, Conversation, QueryMetrics, QueryOptions, QueryResponse, StreamEvent, Turn, TurnRole};
pub use error::OrchestratorError;
pub use llm::{FallbackLlmProvider, LlmError, LlmProvider, MockLlmProvider, TokenStream};
pub use response_cache::ResponseCache;
pub use service::{OrchestratorConfig, RagOrchestrator};
