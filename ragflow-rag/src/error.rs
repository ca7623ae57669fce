use ragflow_core::RagError;

#[derive(Debug)]
pub enum OrchestratorError {
    TenantInactive,
    QueryTooLong { len: usize, max: usize },
    ModelNotAllowed(String),
    RetrievalUnavailable(String),
    LlmUnavailable(String),
    ConversationNotFound,
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorError::TenantInactive => write!(f, "tenant is not active"),
            OrchestratorError::QueryTooLong { len, max } => write!(f, "query length {len} exceeds max {max}"),
            OrchestratorError::ModelNotAllowed(m) => write!(f, "model '{m}' is not allowed for this tenant"),
            OrchestratorError::RetrievalUnavailable(m) => write!(f, "retrieval_unavailable: {m}"),
            OrchestratorError::LlmUnavailable(m) => write!(f, "llm unavailable: {m}"),
            OrchestratorError::ConversationNotFound => write!(f, "conversation not found"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<OrchestratorError> for RagError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::TenantInactive => RagError::FailedPrecondition(err.to_string()),
            OrchestratorError::QueryTooLong { .. } | OrchestratorError::ModelNotAllowed(_) => {
                RagError::InvalidArgument(err.to_string())
            }
            OrchestratorError::RetrievalUnavailable(_) | OrchestratorError::LlmUnavailable(_) => {
                RagError::Unavailable(err.to_string())
            }
            OrchestratorError::ConversationNotFound => RagError::NotFound(err.to_string()),
        }
    }
}
