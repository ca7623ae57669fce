//! Breaks the `ragflow-tenancy` <-> `ragflow-ingestion` construction cycle:
//! `TenantService` needs a `TenantOccupancyCheck` to refuse deleting a
//! non-empty tenant, but the only thing that knows whether a tenant is
//! empty is `IngestionService`, which itself depends on `TenantService`.
//!
//! `TenantService` is built first against this deferred handle, defaulting
//! to "empty" until `IngestionService` exists and calls `set`.

use std::sync::Arc;

use ragflow_core::RagError;
use ragflow_tenancy::TenantOccupancyCheck;
use tokio::sync::OnceCell;
use uuid::Uuid;

#[derive(Default)]
pub struct DeferredOccupancyCheck {
    inner: OnceCell<Arc<dyn TenantOccupancyCheck>>,
}

impl DeferredOccupancyCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once by the composition root right after `IngestionService`
    /// is constructed. Panics on a second call — there is exactly one real
    /// occupancy checker per process.
    pub fn set(&self, checker: Arc<dyn TenantOccupancyCheck>) {
        self.inner.set(checker).expect("DeferredOccupancyCheck::set called more than once");
    }
}

#[async_trait::async_trait]
impl TenantOccupancyCheck for DeferredOccupancyCheck {
    async fn is_empty(&self, tenant_id: Uuid) -> Result<bool, RagError> {
        match self.inner.get() {
            Some(checker) => checker.is_empty(tenant_id).await,
            None => Ok(true),
        }
    }
}
