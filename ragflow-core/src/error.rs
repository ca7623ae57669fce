use fabric_core::http::response::{IntoResponse, Response};
use fabric_core::http::{Json, StatusCode};
use serde::Serialize;

/// The uniform error kinds shared by every ragflow service.
///
/// Each kind maps to exactly one wire code and HTTP status — see
/// [`RagError::code`] and [`RagError::status`]. Leaf crates (`ragflow-storage`,
/// `ragflow-eventbus`, ...) raise narrower errors (`StorageError`, `BusError`)
/// and convert into one of these via `From`, the same pattern `fabric_data::DataError`
/// uses to become `fabric_core::HttpError`.
#[derive(Debug)]
pub enum RagError {
    InvalidArgument(String),
    Unauthenticated(String),
    PermissionDenied(String),
    NotFound(String),
    Conflict(String),
    QuotaExceeded(String),
    RateLimited(String),
    FailedPrecondition(String),
    Unavailable(String),
    Internal(String),
}

impl RagError {
    /// The stable wire code sent in the error envelope's `error.code` field.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::InvalidArgument(_) => "INVALID_ARGUMENT",
            RagError::Unauthenticated(_) => "UNAUTHENTICATED",
            RagError::PermissionDenied(_) => "PERMISSION_DENIED",
            RagError::NotFound(_) => "NOT_FOUND",
            RagError::Conflict(_) => "CONFLICT",
            RagError::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            RagError::RateLimited(_) => "RATE_LIMITED",
            RagError::FailedPrecondition(_) => "FAILED_PRECONDITION",
            RagError::Unavailable(_) => "UNAVAILABLE",
            RagError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RagError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RagError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            RagError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            RagError::NotFound(_) => StatusCode::NOT_FOUND,
            RagError::Conflict(_) => StatusCode::CONFLICT,
            RagError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            RagError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            RagError::FailedPrecondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RagError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RagError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            RagError::InvalidArgument(m)
            | RagError::Unauthenticated(m)
            | RagError::PermissionDenied(m)
            | RagError::NotFound(m)
            | RagError::Conflict(m)
            | RagError::QuotaExceeded(m)
            | RagError::RateLimited(m)
            | RagError::FailedPrecondition(m)
            | RagError::Unavailable(m)
            | RagError::Internal(m) => m,
        }
    }

    /// Whether the operation that raised this error is safe to retry
    /// (per the propagation policy: transient/infra errors are, validation
    /// and auth errors never are).
    pub fn retryable(&self) -> bool {
        matches!(self, RagError::Unavailable(_) | RagError::RateLimited(_))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    status: &'static str,
    error: ErrorBody<'a>,
    timestamp: String,
    request_id: Option<String>,
}

impl RagError {
    /// Build the response envelope with a known request id attached.
    ///
    /// The gateway's error-mapping layer calls this with the inbound
    /// `RequestId` so every error response carries it; handlers that build a
    /// `RagError` response directly (outside that layer) fall back to
    /// [`IntoResponse`], which sends `request_id: null`.
    pub fn into_response_with_request_id(self, request_id: impl Into<String>) -> Response {
        self.response(Some(request_id.into()))
    }

    fn response(&self, request_id: Option<String>) -> Response {
        let envelope = ErrorEnvelope {
            status: "error",
            error: ErrorBody {
                code: self.code(),
                message: self.message(),
            },
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        };
        (self.status(), Json(serde_json::to_value(&envelope).unwrap_or_default())).into_response()
    }
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        self.response(None)
    }
}

impl std::fmt::Display for RagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for RagError {}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Internal(err.to_string())
    }
}
