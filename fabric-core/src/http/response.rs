pub use axum::response::sse::{Event as SseEvent, KeepAlive as SseKeepAlive};
pub use axum::response::{Html, IntoResponse, Redirect, Response, Sse};
