use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message in flight on the bus: a topic, an ordering key, and a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    /// Messages sharing a key are delivered to a topic's subscribers in the
    /// order they were published; messages with different keys carry no
    /// ordering guarantee relative to one another.
    pub key: String,
    pub payload: Value,
    /// 1 on first delivery attempt, incremented on each redelivery.
    pub attempt: u32,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: Value) -> Self {
        Self { topic: topic.into(), key: key.into(), payload, attempt: 1 }
    }
}

/// What a dead-lettered message looks like once routed to `<topic>.dead-letter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub original_topic: String,
    pub key: String,
    pub payload: Value,
    pub error: String,
    pub attempts: u32,
    pub dead_lettered_at: DateTime<Utc>,
}

pub fn dead_letter_topic(topic: &str) -> String {
    format!("{topic}.dead-letter")
}
