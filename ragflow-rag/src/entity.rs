use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub citations: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: TurnRole::User, text: text.into(), citations: Vec::new(), timestamp: Utc::now() }
    }

    pub fn assistant(text: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self { role: TurnRole::Assistant, text: text.into(), citations, timestamp: Utc::now() }
    }
}

/// Ordered turns for one user session. Summary rollover preserves citations
/// only by the document ids they reference, never the full chunk text, so a
/// long-lived conversation's stored size is bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub turns: Vec<Turn>,
    pub summary: Option<String>,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    pub fn new(tenant_id: Uuid, user_id: Uuid) -> Self {
        Self { id: Uuid::new_v4(), tenant_id, user_id, turns: Vec::new(), summary: None, last_activity: Utc::now() }
    }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub top_k: usize,
    pub include_context: bool,
    pub stream: bool,
    pub model: Option<String>,
    pub max_tokens: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { top_k: 5, include_context: true, stream: false, model: None, max_tokens: 1024 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMetrics {
    pub retrieve_ms: u64,
    pub embed_ms: u64,
    pub llm_ms: u64,
    pub total_ms: u64,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub metrics: QueryMetrics,
}

/// One event in a streaming response. `ragflow-server` maps these onto SSE
/// events; this crate has no HTTP dependency of its own.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Token(String),
    Done { citations: Vec<Citation>, metrics: QueryMetrics },
    Error { code: &'static str, message: String },
}
