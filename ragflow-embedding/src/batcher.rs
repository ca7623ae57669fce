//! Coalesces individual embed requests into upstream batches of up to
//! `max_batch`, flushing early once `max_wait` elapses so a lone request
//! never waits the full window. One worker task owns the provider handle;
//! callers talk to it over a channel and await a oneshot reply.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::EmbeddingError;
use crate::provider::EmbeddingProvider;

struct PendingRequest {
    model: String,
    text: String,
    respond_to: oneshot::Sender<Result<Vec<f32>, EmbeddingError>>,
}

#[derive(Clone)]
pub struct EmbeddingBatcher {
    tx: mpsc::UnboundedSender<PendingRequest>,
}

impl EmbeddingBatcher {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, max_batch: usize, max_wait: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(provider, max_batch.max(1), max_wait, rx));
        Self { tx }
    }

    pub async fn embed(&self, model: impl Into<String>, text: impl Into<String>) -> Result<Vec<f32>, EmbeddingError> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(PendingRequest { model: model.into(), text: text.into(), respond_to })
            .map_err(|_| EmbeddingError::ProviderUnavailable("batcher worker is gone".into()))?;
        rx.await.map_err(|_| EmbeddingError::ProviderUnavailable("batcher dropped the request".into()))?
    }
}

async fn run_worker(
    provider: Arc<dyn EmbeddingProvider>,
    max_batch: usize,
    max_wait: Duration,
    mut rx: mpsc::UnboundedReceiver<PendingRequest>,
) {
    loop {
        let first = match rx.recv().await {
            Some(req) => req,
            None => return,
        };
        let mut batch = vec![first];
        let deadline = tokio::time::sleep(max_wait);
        tokio::pin!(deadline);
        while batch.len() < max_batch {
            tokio::select! {
                _ = &mut deadline => break,
                maybe = rx.recv() => match maybe {
                    Some(req) => batch.push(req),
                    None => break,
                },
            }
        }
        flush(&provider, batch).await;
    }
}

async fn flush(provider: &Arc<dyn EmbeddingProvider>, batch: Vec<PendingRequest>) {
    let mut groups: HashMap<String, Vec<PendingRequest>> = HashMap::new();
    for req in batch {
        groups.entry(req.model.clone()).or_default().push(req);
    }
    for (model, reqs) in groups {
        let texts: Vec<String> = reqs.iter().map(|r| r.text.clone()).collect();
        match provider.embed_batch(&model, &texts).await {
            Ok(embeddings) => {
                for (req, embedding) in reqs.into_iter().zip(embeddings) {
                    let _ = req.respond_to.send(Ok(embedding));
                }
            }
            Err(e) => {
                for req in reqs {
                    let _ = req.respond_to.send(Err(e.clone()));
                }
            }
        }
    }
}
