//! Audit log entries for the status transitions called out across the
//! domain as "audited" — user registration, status changes, document
//! deletion, and the like. Entries are write-once: nothing in this module
//! offers an update or delete path.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// `None` for actions performed by the system itself (e.g. a scheduled
    /// job), rather than a human user.
    pub actor_user_id: Option<Uuid>,
    /// e.g. `"user.registered"`, `"user.status_changed"`, `"document.deleted"`.
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub detail: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to record a new entry; `id`/`created_at` are assigned by
/// the sink at write time.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub tenant_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub detail: HashMap<String, Value>,
}

impl NewAuditEntry {
    pub fn new(
        tenant_id: Uuid,
        action: impl Into<String>,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            actor_user_id: None,
            action: action.into(),
            target_type: target_type.into(),
            target_id: target_id.into(),
            detail: HashMap::new(),
        }
    }

    pub fn actor(mut self, actor_user_id: Uuid) -> Self {
        self.actor_user_id = Some(actor_user_id);
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }
}

/// Where audit entries are durably recorded. `ragflow-identity` and
/// `ragflow-ingestion` each hold a handle to one of these to record the
/// transitions they're responsible for.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: NewAuditEntry) -> AuditEntry;

    fn entries_for_tenant(&self, tenant_id: Uuid) -> Vec<AuditEntry>;
}

/// In-process sink backed by a `Mutex<Vec<_>>`. Fine for tests and single-node
/// deployments; a durable sink would back this with the same `Repository<T, ID>`
/// used elsewhere in the domain.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, entry: NewAuditEntry) -> AuditEntry {
        let recorded = AuditEntry {
            id: Uuid::new_v4(),
            tenant_id: entry.tenant_id,
            actor_user_id: entry.actor_user_id,
            action: entry.action,
            target_type: entry.target_type,
            target_id: entry.target_id,
            detail: entry.detail,
            created_at: Utc::now(),
        };
        tracing::info!(
            tenant_id = %recorded.tenant_id,
            actor_user_id = ?recorded.actor_user_id,
            action = %recorded.action,
            target_type = %recorded.target_type,
            target_id = %recorded.target_id,
            "audit entry recorded"
        );
        self.entries.lock().expect("audit sink mutex poisoned").push(recorded.clone());
        recorded
    }

    fn entries_for_tenant(&self, tenant_id: Uuid) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .expect("audit sink mutex poisoned")
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect()
    }
}
