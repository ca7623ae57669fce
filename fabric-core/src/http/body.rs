pub use axum::body::Body;
