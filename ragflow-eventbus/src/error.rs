use ragflow_core::RagError;

#[derive(Debug)]
pub enum BusError {
    /// Raised by a handler; carries the reason the message was not processed.
    HandlerFailed(String),
    /// The bus itself could not accept or route the message (channel closed, etc).
    Unavailable(String),
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::HandlerFailed(m) => write!(f, "handler failed: {m}"),
            BusError::Unavailable(m) => write!(f, "bus unavailable: {m}"),
        }
    }
}

impl std::error::Error for BusError {}

impl From<BusError> for RagError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::HandlerFailed(m) => RagError::Internal(m),
            BusError::Unavailable(m) => RagError::Unavailable(m),
        }
    }
}
