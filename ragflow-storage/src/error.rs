use ragflow_core::RagError;

/// Errors raised by the storage adapters, narrower than [`RagError`] so each
/// adapter can report precisely what went wrong; converts into `RagError`
/// the same way `fabric_data::DataError` converts into `fabric_core::HttpError`.
#[derive(Debug)]
pub enum StorageError {
    NotFound(String),
    TenantMismatch(String),
    QuotaExceeded(String),
    Backend(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(m) => write!(f, "not found: {m}"),
            StorageError::TenantMismatch(m) => write!(f, "tenant mismatch: {m}"),
            StorageError::QuotaExceeded(m) => write!(f, "quota exceeded: {m}"),
            StorageError::Backend(m) => write!(f, "backend error: {m}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for RagError {
    fn from(err: StorageError) -> Self {
        match err {
            // Cross-tenant access fails NotFound, not PermissionDenied, to avoid leaking existence.
            StorageError::NotFound(m) | StorageError::TenantMismatch(m) => RagError::NotFound(m),
            StorageError::QuotaExceeded(m) => RagError::QuotaExceeded(m),
            StorageError::Backend(m) => RagError::Unavailable(m),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound("row not found".into()),
            other => StorageError::Backend(other.to_string()),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}
