use ragflow_core::RagError;

#[derive(Debug)]
pub enum IngestionError {
    UnsupportedContentType(String),
    FileTooLarge { size: i64, max: i64 },
    TenantInactive,
    DocumentQuotaExceeded,
    StorageQuotaExceeded,
    ExtractionFailed(String),
    EmptyDocument,
}

impl std::fmt::Display for IngestionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestionError::UnsupportedContentType(c) => write!(f, "unsupported content type: {c}"),
            IngestionError::FileTooLarge { size, max } => write!(f, "file size {size} exceeds max {max}"),
            IngestionError::TenantInactive => write!(f, "tenant is not active"),
            IngestionError::DocumentQuotaExceeded => write!(f, "tenant document quota exceeded"),
            IngestionError::StorageQuotaExceeded => write!(f, "tenant storage quota exceeded"),
            IngestionError::ExtractionFailed(reason) => write!(f, "text extraction failed: {reason}"),
            IngestionError::EmptyDocument => write!(f, "extracted text is empty or garbage"),
        }
    }
}

impl std::error::Error for IngestionError {}

impl From<IngestionError> for RagError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::UnsupportedContentType(_) | IngestionError::FileTooLarge { .. } => {
                RagError::InvalidArgument(err.to_string())
            }
            IngestionError::TenantInactive => RagError::FailedPrecondition(err.to_string()),
            IngestionError::DocumentQuotaExceeded | IngestionError::StorageQuotaExceeded => {
                RagError::QuotaExceeded(err.to_string())
            }
            IngestionError::ExtractionFailed(_) | IngestionError::EmptyDocument => RagError::Internal(err.to_string()),
        }
    }
}
