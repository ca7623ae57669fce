//! Conversations live entirely in the shared KV namespace (§4.7 lists
//! "conversation summaries" among the KV adapter's tenants) rather than a
//! relational table, since their natural lifecycle is TTL-based expiry
//! rather than durable storage.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use ragflow_storage::{tenant_key, KvStore};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::entity::Conversation;

#[derive(Clone)]
pub struct ConversationStore {
    kv: Arc<dyn KvStore>,
    idle_ttl: Duration,
}

impl ConversationStore {
    pub fn new(kv: Arc<dyn KvStore>, idle_ttl: Duration) -> Self {
        Self { kv, idle_ttl }
    }

    fn key(&self, tenant_id: Uuid, conversation_id: Uuid) -> String {
        tenant_key(tenant_id, &format!("conversation:{conversation_id}"))
    }

    pub async fn get(&self, tenant_id: Uuid, conversation_id: Uuid) -> Option<Conversation> {
        let bytes = self.kv.get(&self.key(tenant_id, conversation_id)).await.ok().flatten()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Writes the conversation back and refreshes its idle TTL — any
    /// activity (a new turn, a summary rollover) postpones expiry.
    pub async fn put(&self, conversation: &Conversation) -> Result<(), ragflow_storage::StorageError> {
        let key = self.key(conversation.tenant_id, conversation.id);
        let bytes = serde_json::to_vec(conversation).map_err(|e| ragflow_storage::StorageError::Backend(e.to_string()))?;
        self.kv.set(&key, Bytes::from(bytes), Some(self.idle_ttl)).await
    }

    pub async fn delete(&self, tenant_id: Uuid, conversation_id: Uuid) -> Result<(), ragflow_storage::StorageError> {
        self.kv.delete(&self.key(tenant_id, conversation_id)).await
    }
}

/// Per-conversation in-process lease so concurrent requests against the same
/// conversation serialize their turn appends (§5's "turns are appended under
/// a per-conversation lock"). A KV-based lease would be required across
/// multiple gateway processes; a single orchestrator instance only needs
/// this in-memory form, upgradeable later without changing callers.
#[derive(Default, Clone)]
pub struct ConversationLock {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConversationLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, conversation_id: Uuid) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(conversation_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragflow_storage::InMemoryKvStore;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = ConversationStore::new(Arc::new(InMemoryKvStore::new()), Duration::from_secs(3600));
        let conversation = Conversation::new(Uuid::new_v4(), Uuid::new_v4());
        store.put(&conversation).await.unwrap();
        let fetched = store.get(conversation.tenant_id, conversation.id).await.unwrap();
        assert_eq!(fetched.id, conversation.id);
    }

    #[tokio::test]
    async fn missing_conversation_returns_none() {
        let store = ConversationStore::new(Arc::new(InMemoryKvStore::new()), Duration::from_secs(3600));
        assert!(store.get(Uuid::new_v4(), Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn lock_serializes_concurrent_acquires() {
        let lock = ConversationLock::new();
        let id = Uuid::new_v4();
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let guard = lock.acquire(id).await;
        let lock2 = lock.clone();
        let order2 = order.clone();
        let handle = tokio::spawn(async move {
            let _guard = lock2.acquire(id).await;
            order2.lock().await.push(2);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().await.push(1);
        drop(guard);
        handle.await.unwrap();
        assert_eq!(*order.lock().await, vec![1, 2]);
    }
}
