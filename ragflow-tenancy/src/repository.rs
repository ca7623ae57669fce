use async_trait::async_trait;
use fabric_data::{DataError, Page, Pageable, Repository};
use fabric_data_sqlx::SqlxErrorExt;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entity::{NewTenant, Tenant};

#[async_trait]
pub trait TenantRepository: Repository<Tenant, Uuid> {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DataError>;
    async fn create(&self, new_tenant: NewTenant) -> Result<Tenant, DataError>;
}

#[derive(Clone)]
pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Tenant, Uuid> for PgTenantRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DataError> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_all(&self) -> Result<Vec<Tenant>, DataError> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_all_paged(&self, pageable: &Pageable) -> Result<Page<Tenant>, DataError> {
        let content = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants ORDER BY created_at LIMIT $1 OFFSET $2",
        )
        .bind(pageable.size as i64)
        .bind(pageable.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

        Ok(Page::new(content, pageable, total as u64))
    }

    async fn save(&self, entity: &Tenant) -> Result<Tenant, DataError> {
        sqlx::query_as::<_, Tenant>(
            r#"
            UPDATE tenants SET
                slug = $2, status = $3, max_documents = $4, max_storage_bytes = $5,
                chunk_size = $6, chunk_overlap = $7, chunking_strategy = $8,
                embedding_model = $9, llm_model = $10, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(entity.id)
        .bind(&entity.slug)
        .bind(entity.status)
        .bind(entity.max_documents)
        .bind(entity.max_storage_bytes)
        .bind(entity.chunk_size)
        .bind(entity.chunk_overlap)
        .bind(entity.chunking_strategy)
        .bind(&entity.embedding_model)
        .bind(&entity.llm_model)
        .fetch_one(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, DataError> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, DataError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(total as u64)
    }
}

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DataError> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn create(&self, new_tenant: NewTenant) -> Result<Tenant, DataError> {
        sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (
                id, slug, status, max_documents, max_storage_bytes,
                chunk_size, chunk_overlap, chunking_strategy, embedding_model, llm_model,
                created_at, updated_at
            )
            VALUES ($1, $2, 'ACTIVE', $3, $4, $5, $6, $7, $8, $9, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_tenant.slug)
        .bind(new_tenant.max_documents)
        .bind(new_tenant.max_storage_bytes)
        .bind(new_tenant.chunk_size)
        .bind(new_tenant.chunk_overlap)
        .bind(new_tenant.chunking_strategy)
        .bind(&new_tenant.embedding_model)
        .bind(&new_tenant.llm_model)
        .fetch_one(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
    }
}
