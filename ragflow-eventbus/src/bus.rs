//! In-process event bus: at-least-once delivery, ordered per key, with a
//! dead-letter topic for messages that exhaust their retry budget.
//!
//! Ordering is enforced by routing every message for a given `(topic, key)`
//! pair through a single worker task backed by an unbounded channel — a
//! worker never starts message N+1 until message N either succeeds or is
//! dead-lettered, so handlers never need to reorder or deduplicate by
//! themselves beyond ordinary idempotency.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use crate::error::BusError;
use crate::message::{dead_letter_topic, BusMessage, DeadLetter};

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &BusMessage) -> Result<(), BusError>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(BusMessage) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BusError>> + Send,
{
    async fn handle(&self, message: &BusMessage) -> Result<(), BusError> {
        (self.f)(message.clone()).await
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, backoff: Duration::from_millis(50) }
    }
}

struct TopicState {
    handlers: RwLock<Vec<Arc<dyn MessageHandler>>>,
    key_workers: DashMap<String, mpsc::UnboundedSender<BusMessage>>,
}

impl TopicState {
    fn new() -> Self {
        Self { handlers: RwLock::new(Vec::new()), key_workers: DashMap::new() }
    }
}

struct Inner {
    topics: DashMap<String, Arc<TopicState>>,
    retry_policy: RetryPolicy,
}

#[derive(Clone)]
pub struct InProcessEventBus {
    inner: Arc<Inner>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self::with_retry_policy(RetryPolicy::default())
    }

    pub fn with_retry_policy(retry_policy: RetryPolicy) -> Self {
        Self { inner: Arc::new(Inner { topics: DashMap::new(), retry_policy }) }
    }

    fn topic_state(&self, topic: &str) -> Arc<TopicState> {
        self.inner
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(TopicState::new()))
            .clone()
    }

    pub async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) {
        let state = self.topic_state(topic);
        state.handlers.write().await.push(handler);
    }

    pub async fn subscribe_fn<F, Fut>(&self, topic: &str, handler: F)
    where
        F: Fn(BusMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BusError>> + Send + 'static,
    {
        self.subscribe(topic, Arc::new(FnHandler { f: handler })).await;
    }

    /// Accepts `(topic, key, payload)` and returns once the message has been
    /// durably enqueued on that key's worker. Consumers deliver it
    /// asynchronously; this does not wait for processing.
    pub async fn publish(&self, topic: &str, key: &str, payload: Value) -> Result<(), BusError> {
        self.enqueue(BusMessage::new(topic, key, payload)).await
    }

    async fn enqueue(&self, message: BusMessage) -> Result<(), BusError> {
        let state = self.topic_state(&message.topic);
        let sender = self.key_worker_sender(&message.topic, &message.key, state);
        sender.send(message).map_err(|_| BusError::Unavailable("key worker channel closed".into()))
    }

    fn key_worker_sender(
        &self,
        topic: &str,
        key: &str,
        state: Arc<TopicState>,
    ) -> mpsc::UnboundedSender<BusMessage> {
        if let Some(existing) = state.key_workers.get(key) {
            return existing.clone();
        }
        let (tx, rx) = mpsc::unbounded_channel::<BusMessage>();
        let bus = self.clone();
        let topic = topic.to_string();
        let worker_state = state.clone();
        tokio::spawn(async move {
            bus.run_key_worker(topic, worker_state, rx).await;
        });
        state.key_workers.insert(key.to_string(), tx.clone());
        tx
    }

    async fn run_key_worker(
        &self,
        topic: String,
        state: Arc<TopicState>,
        mut rx: mpsc::UnboundedReceiver<BusMessage>,
    ) {
        while let Some(mut message) = rx.recv().await {
            loop {
                let handlers = state.handlers.read().await.clone();
                let mut failure: Option<BusError> = None;
                for handler in &handlers {
                    if let Err(e) = handler.handle(&message).await {
                        failure = Some(e);
                        break;
                    }
                }
                match failure {
                    None => break,
                    Some(e) => {
                        if message.attempt >= self.inner.retry_policy.max_attempts {
                            self.dead_letter(&topic, message, e).await;
                            break;
                        }
                        tracing::warn!(
                            topic = %topic,
                            key = %message.key,
                            attempt = message.attempt,
                            error = %e,
                            "message processing failed, retrying"
                        );
                        tokio::time::sleep(self.inner.retry_policy.backoff).await;
                        message.attempt += 1;
                    }
                }
            }
        }
    }

    async fn dead_letter(&self, topic: &str, message: BusMessage, error: BusError) {
        tracing::error!(
            topic = %topic,
            key = %message.key,
            attempts = message.attempt,
            error = %error,
            "message exhausted retries, routing to dead letter"
        );
        let dead_letter = DeadLetter {
            original_topic: topic.to_string(),
            key: message.key.clone(),
            payload: message.payload.clone(),
            error: error.to_string(),
            attempts: message.attempt,
            dead_lettered_at: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&dead_letter).unwrap_or_default();
        if let Err(e) = self.publish(&dead_letter_topic(topic), &message.key, value).await {
            tracing::error!(error = %e, "failed to publish to dead-letter topic");
        }
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new()
    }
}
