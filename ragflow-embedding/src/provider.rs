//! The embedding model itself is an external collaborator; this crate only
//! defines the interface it's invoked through and a deterministic mock
//! implementation for tests and local development.

use async_trait::async_trait;

use crate::error::EmbeddingError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds every text in one upstream call. Implementations should accept
    /// as many texts as the caller passes; batching policy lives in
    /// [`crate::batcher::EmbeddingBatcher`], not here.
    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The fixed dimension `model` produces. Used to assert upsert calls
    /// never silently write a truncated or padded vector.
    fn dimension(&self, model: &str) -> Result<usize, EmbeddingError>;
}

/// Deterministic stand-in for a real embedding API: hashes the text into a
/// fixed-size float vector so the same input always produces the same
/// output, without a network call or API key.
pub struct MockEmbeddingProvider {
    dimension: usize,
    known_models: Vec<String>,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize, known_models: Vec<String>) -> Self {
        Self { dimension, known_models }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};
        let mut out = Vec::with_capacity(self.dimension);
        let mut seed = text.as_bytes().to_vec();
        while out.len() < self.dimension {
            let digest = Sha256::digest(&seed);
            for byte in digest.iter() {
                if out.len() >= self.dimension {
                    break;
                }
                out.push((*byte as f32 / 255.0) * 2.0 - 1.0);
            }
            seed = digest.to_vec();
        }
        out
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if !self.known_models.iter().any(|m| m == model) {
            return Err(EmbeddingError::UnknownModel(model.to_string()));
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self, model: &str) -> Result<usize, EmbeddingError> {
        if !self.known_models.iter().any(|m| m == model) {
            return Err(EmbeddingError::UnknownModel(model.to_string()));
        }
        Ok(self.dimension)
    }
}
