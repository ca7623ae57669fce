use ragflow_core::RagError;

#[derive(Debug, Clone)]
pub enum EmbeddingError {
    ProviderUnavailable(String),
    UnknownModel(String),
    DimensionMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingError::ProviderUnavailable(m) => write!(f, "embedding provider unavailable: {m}"),
            EmbeddingError::UnknownModel(m) => write!(f, "unknown embedding model: {m}"),
            EmbeddingError::DimensionMismatch { expected, actual } => {
                write!(f, "embedding dimension mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for EmbeddingError {}

impl From<EmbeddingError> for RagError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::ProviderUnavailable(_) => RagError::Unavailable(err.to_string()),
            EmbeddingError::UnknownModel(_) => RagError::InvalidArgument(err.to_string()),
            EmbeddingError::DimensionMismatch { .. } => RagError::Internal(err.to_string()),
        }
    }
}
