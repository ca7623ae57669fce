//! The LLM itself is an external collaborator (§1's explicit non-goal); this
//! crate owns only the interface it's invoked through, a deterministic mock
//! for tests, and the primary/fallback switch-over policy from §4.5.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;

#[derive(Debug, Clone)]
pub enum LlmError {
    Unavailable(String),
    InvalidModel(String),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::Unavailable(m) => write!(f, "llm unavailable: {m}"),
            LlmError::InvalidModel(m) => write!(f, "invalid llm model: {m}"),
        }
    }
}

impl std::error::Error for LlmError {}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str, max_tokens: usize) -> Result<String, LlmError>;

    async fn generate_stream(&self, model: &str, prompt: &str, max_tokens: usize) -> Result<TokenStream, LlmError>;

    /// Cheap liveness probe used by [`FallbackLlmProvider`] to decide when to
    /// switch back from the fallback to the primary.
    async fn health_check(&self) -> bool {
        true
    }
}

/// Canned responder: echoes a fixed-shape answer referencing the prompt, so
/// tests can assert on citation wiring without a real model.
pub struct MockLlmProvider {
    known_models: Vec<String>,
    healthy: AtomicBool,
}

impl MockLlmProvider {
    pub fn new(known_models: Vec<String>) -> Self {
        Self { known_models, healthy: AtomicBool::new(true) }
    }

    /// Test hook: force `health_check` to report unhealthy.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn answer_for(prompt: &str, max_tokens: usize) -> String {
        let words: Vec<&str> = prompt.split_whitespace().take(max_tokens.max(1)).collect();
        format!("Based on the provided context: {}", words.join(" "))
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, model: &str, prompt: &str, max_tokens: usize) -> Result<String, LlmError> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(LlmError::Unavailable("mock provider forced unhealthy".into()));
        }
        if !self.known_models.iter().any(|m| m == model) {
            return Err(LlmError::InvalidModel(model.to_string()));
        }
        Ok(Self::answer_for(prompt, max_tokens))
    }

    async fn generate_stream(&self, model: &str, prompt: &str, max_tokens: usize) -> Result<TokenStream, LlmError> {
        let answer = self.generate(model, prompt, max_tokens).await?;
        // split_inclusive keeps the trailing space on every token but the last, so
        // concatenating the stream back together reproduces `answer` exactly.
        let words: Vec<String> = answer.split_inclusive(' ').map(|w| w.to_string()).collect();
        let stream = futures_util::stream::iter(words).then(|word| async move {
            tokio::time::sleep(Duration::from_micros(100)).await;
            Ok(word)
        });
        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Switches from `primary` to `fallback` after `primary_fail_threshold`
/// consecutive failures, and reverts once `primary.health_check()` succeeds
/// again (§4.5's provider-selection failure semantics).
pub struct FallbackLlmProvider {
    primary: Arc<dyn LlmProvider>,
    fallback: Arc<dyn LlmProvider>,
    primary_fail_threshold: u32,
    consecutive_failures: AtomicU32,
    using_fallback: AtomicBool,
}

impl FallbackLlmProvider {
    pub fn new(primary: Arc<dyn LlmProvider>, fallback: Arc<dyn LlmProvider>, primary_fail_threshold: u32) -> Self {
        Self {
            primary,
            fallback,
            primary_fail_threshold,
            consecutive_failures: AtomicU32::new(0),
            using_fallback: AtomicBool::new(false),
        }
    }

    async fn active_provider(&self) -> &Arc<dyn LlmProvider> {
        if self.using_fallback.load(Ordering::SeqCst) {
            if self.primary.health_check().await {
                self.using_fallback.store(false, Ordering::SeqCst);
                self.consecutive_failures.store(0, Ordering::SeqCst);
                &self.primary
            } else {
                &self.fallback
            }
        } else {
            &self.primary
        }
    }

    fn note_primary_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.primary_fail_threshold {
            self.using_fallback.store(true, Ordering::SeqCst);
            tracing::warn!(failures, "primary llm provider exceeded failure threshold, switching to fallback");
        }
    }
}

#[async_trait]
impl LlmProvider for FallbackLlmProvider {
    async fn generate(&self, model: &str, prompt: &str, max_tokens: usize) -> Result<String, LlmError> {
        let was_using_fallback = self.using_fallback.load(Ordering::SeqCst);
        let provider = self.active_provider().await.clone();
        match provider.generate(model, prompt, max_tokens).await {
            Ok(answer) => {
                if !was_using_fallback {
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                }
                Ok(answer)
            }
            Err(e) => {
                if !self.using_fallback.load(Ordering::SeqCst) {
                    self.note_primary_failure();
                }
                Err(e)
            }
        }
    }

    async fn generate_stream(&self, model: &str, prompt: &str, max_tokens: usize) -> Result<TokenStream, LlmError> {
        let provider = self.active_provider().await.clone();
        match provider.generate_stream(model, prompt, max_tokens).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                if !self.using_fallback.load(Ordering::SeqCst) {
                    self.note_primary_failure();
                }
                Err(e)
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.primary.health_check().await || self.fallback.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn switches_to_fallback_after_threshold_then_reverts() {
        let primary = Arc::new(MockLlmProvider::new(vec!["m".into()]));
        let fallback = Arc::new(MockLlmProvider::new(vec!["m".into()]));
        primary.set_healthy(false);
        let provider = FallbackLlmProvider::new(primary.clone(), fallback.clone(), 2);

        assert!(provider.generate("m", "hi", 8).await.is_err());
        assert!(!provider.using_fallback.load(Ordering::SeqCst));
        assert!(provider.generate("m", "hi", 8).await.is_err());
        assert!(provider.using_fallback.load(Ordering::SeqCst));

        let answer = provider.generate("m", "hi there", 8).await.unwrap();
        assert!(answer.contains("hi there"));

        primary.set_healthy(true);
        let answer = provider.generate("m", "back online", 8).await.unwrap();
        assert!(!provider.using_fallback.load(Ordering::SeqCst));
        assert!(answer.contains("back online"));
    }

    #[tokio::test]
    async fn mock_stream_yields_words_in_order() {
        let provider = MockLlmProvider::new(vec!["m".into()]);
        let mut stream = provider.generate_stream("m", "alpha beta", 8).await.unwrap();
        let mut tokens = Vec::new();
        while let Some(token) = stream.next().await {
            tokens.push(token.unwrap());
        }
        assert_eq!(tokens.concat(), "Based on the provided context: alpha beta");
    }
}
