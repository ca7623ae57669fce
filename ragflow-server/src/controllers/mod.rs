pub mod auth_controller;
pub mod document_controller;
pub mod embeddings_controller;
pub mod jwks_controller;
pub mod rag_controller;
pub mod scheduled_jobs;
