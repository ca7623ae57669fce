use std::sync::Arc;

use async_trait::async_trait;
use ragflow_core::{AuditSink, NewAuditEntry, RagError};
use uuid::Uuid;

use crate::entity::{NewTenant, Tenant, TenantStatus};
use crate::repository::TenantRepository;

/// Asks whether a tenant still owns data that would make deletion unsafe.
/// Implemented by `ragflow-ingestion` (document count) so this crate doesn't
/// need a dependency edge back to it.
#[async_trait]
pub trait TenantOccupancyCheck: Send + Sync {
    async fn is_empty(&self, tenant_id: Uuid) -> Result<bool, RagError>;
}

pub struct TenantService {
    repository: Arc<dyn TenantRepository>,
    occupancy_check: Arc<dyn TenantOccupancyCheck>,
    audit: Arc<dyn AuditSink>,
}

impl TenantService {
    pub fn new(
        repository: Arc<dyn TenantRepository>,
        occupancy_check: Arc<dyn TenantOccupancyCheck>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { repository, occupancy_check, audit }
    }

    pub async fn create(&self, new_tenant: NewTenant) -> Result<Tenant, RagError> {
        if self.repository.find_by_slug(&new_tenant.slug).await.map_err(map_data_err)?.is_some() {
            return Err(RagError::Conflict(format!("tenant slug '{}' already exists", new_tenant.slug)));
        }
        let slug = new_tenant.slug.clone();
        let tenant = self.repository.create(new_tenant).await.map_err(map_data_err)?;
        self.audit.record(
            NewAuditEntry::new(tenant.id, "tenant.created", "tenant", tenant.id.to_string())
                .detail("slug", slug),
        );
        Ok(tenant)
    }

    pub async fn get(&self, tenant_id: Uuid) -> Result<Tenant, RagError> {
        self.repository
            .find_by_id(&tenant_id)
            .await
            .map_err(map_data_err)?
            .ok_or_else(|| RagError::NotFound(format!("tenant {tenant_id} not found")))
    }

    pub async fn suspend(&self, tenant_id: Uuid) -> Result<Tenant, RagError> {
        self.transition_status(tenant_id, TenantStatus::Suspended).await
    }

    pub async fn activate(&self, tenant_id: Uuid) -> Result<Tenant, RagError> {
        self.transition_status(tenant_id, TenantStatus::Active).await
    }

    async fn transition_status(&self, tenant_id: Uuid, status: TenantStatus) -> Result<Tenant, RagError> {
        let mut tenant = self.get(tenant_id).await?;
        let from = tenant.status;
        tenant.status = status;
        let saved = self.repository.save(&tenant).await.map_err(map_data_err)?;
        self.audit.record(
            NewAuditEntry::new(tenant_id, "tenant.status_changed", "tenant", tenant_id.to_string())
                .detail("from", format!("{from:?}"))
                .detail("to", format!("{status:?}")),
        );
        Ok(saved)
    }

    /// Rejects deletion of a tenant that still owns documents.
    pub async fn delete(&self, tenant_id: Uuid) -> Result<(), RagError> {
        self.get(tenant_id).await?;
        if !self.occupancy_check.is_empty(tenant_id).await? {
            return Err(RagError::FailedPrecondition(format!(
                "tenant {tenant_id} still owns documents; delete them first"
            )));
        }
        self.repository.delete(&tenant_id).await.map_err(map_data_err)?;
        self.audit.record(NewAuditEntry::new(tenant_id, "tenant.deleted", "tenant", tenant_id.to_string()));
        Ok(())
    }
}

fn map_data_err(err: fabric_data::DataError) -> RagError {
    match err {
        fabric_data::DataError::NotFound(m) => RagError::NotFound(m),
        fabric_data::DataError::Database(e) => RagError::Unavailable(e.to_string()),
        fabric_data::DataError::Other(m) => RagError::Internal(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_data::{DataError, Page, Pageable, Repository};
    use ragflow_core::InMemoryAuditSink;
    use std::sync::Mutex;
    use tokio::sync::RwLock as TokioRwLock;

    #[derive(Default)]
    struct FakeRepo {
        tenants: TokioRwLock<Vec<Tenant>>,
    }

    #[async_trait]
    impl Repository<Tenant, Uuid> for FakeRepo {
        async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DataError> {
            Ok(self.tenants.read().await.iter().find(|t| &t.id == id).cloned())
        }
        async fn find_all(&self) -> Result<Vec<Tenant>, DataError> {
            Ok(self.tenants.read().await.clone())
        }
        async fn find_all_paged(&self, pageable: &Pageable) -> Result<Page<Tenant>, DataError> {
            let all = self.tenants.read().await.clone();
            Ok(Page::new(all.clone(), pageable, all.len() as u64))
        }
        async fn save(&self, entity: &Tenant) -> Result<Tenant, DataError> {
            let mut guard = self.tenants.write().await;
            if let Some(existing) = guard.iter_mut().find(|t| t.id == entity.id) {
                *existing = entity.clone();
            }
            Ok(entity.clone())
        }
        async fn delete(&self, id: &Uuid) -> Result<bool, DataError> {
            let mut guard = self.tenants.write().await;
            let before = guard.len();
            guard.retain(|t| &t.id != id);
            Ok(guard.len() != before)
        }
        async fn count(&self) -> Result<u64, DataError> {
            Ok(self.tenants.read().await.len() as u64)
        }
    }

    #[async_trait]
    impl TenantRepository for FakeRepo {
        async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DataError> {
            Ok(self.tenants.read().await.iter().find(|t| t.slug == slug).cloned())
        }
        async fn create(&self, new_tenant: NewTenant) -> Result<Tenant, DataError> {
            let now = chrono::Utc::now();
            let tenant = Tenant {
                id: Uuid::new_v4(),
                slug: new_tenant.slug,
                status: TenantStatus::Active,
                max_documents: new_tenant.max_documents,
                max_storage_bytes: new_tenant.max_storage_bytes,
                chunk_size: new_tenant.chunk_size,
                chunk_overlap: new_tenant.chunk_overlap,
                chunking_strategy: new_tenant.chunking_strategy,
                embedding_model: new_tenant.embedding_model,
                llm_model: new_tenant.llm_model,
                created_at: now,
                updated_at: now,
            };
            self.tenants.write().await.push(tenant.clone());
            Ok(tenant)
        }
    }

    struct AlwaysEmpty;
    #[async_trait]
    impl TenantOccupancyCheck for AlwaysEmpty {
        async fn is_empty(&self, _tenant_id: Uuid) -> Result<bool, RagError> {
            Ok(true)
        }
    }

    struct AlwaysOccupied(Mutex<()>);
    #[async_trait]
    impl TenantOccupancyCheck for AlwaysOccupied {
        async fn is_empty(&self, _tenant_id: Uuid) -> Result<bool, RagError> {
            Ok(false)
        }
    }

    fn new_tenant(slug: &str) -> NewTenant {
        NewTenant {
            slug: slug.to_string(),
            max_documents: 100,
            max_storage_bytes: 1_000_000,
            chunk_size: 1000,
            chunk_overlap: 100,
            chunking_strategy: crate::entity::ChunkingStrategyName::Sentence,
            embedding_model: "text-embedding-3-small".into(),
            llm_model: "gpt-4o-mini".into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_slug() {
        let service = TenantService::new(
            Arc::new(FakeRepo::default()),
            Arc::new(AlwaysEmpty),
            Arc::new(InMemoryAuditSink::new()),
        );
        service.create(new_tenant("acme")).await.unwrap();
        let err = service.create(new_tenant("acme")).await.unwrap_err();
        assert!(matches!(err, RagError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_rejects_non_empty_tenant() {
        let service = TenantService::new(
            Arc::new(FakeRepo::default()),
            Arc::new(AlwaysOccupied(Mutex::new(()))),
            Arc::new(InMemoryAuditSink::new()),
        );
        let tenant = service.create(new_tenant("acme")).await.unwrap();
        let err = service.delete(tenant.id).await.unwrap_err();
        assert!(matches!(err, RagError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn suspend_then_activate_round_trips_status() {
        let service = TenantService::new(
            Arc::new(FakeRepo::default()),
            Arc::new(AlwaysEmpty),
            Arc::new(InMemoryAuditSink::new()),
        );
        let tenant = service.create(new_tenant("acme")).await.unwrap();
        let suspended = service.suspend(tenant.id).await.unwrap();
        assert_eq!(suspended.status, TenantStatus::Suspended);
        let activated = service.activate(tenant.id).await.unwrap();
        assert_eq!(activated.status, TenantStatus::Active);
    }
}
