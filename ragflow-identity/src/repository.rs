use async_trait::async_trait;
use fabric_data::{DataError, Page, Pageable, Repository};
use fabric_data_sqlx::SqlxErrorExt;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entity::{NewUser, User};

#[async_trait]
pub trait UserRepository: Repository<User, Uuid> {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DataError>;
    async fn create(&self, new_user: NewUser) -> Result<User, DataError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<User, Uuid> for PgUserRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, DataError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_all(&self) -> Result<Vec<User>, DataError> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn find_all_paged(&self, pageable: &Pageable) -> Result<Page<User>, DataError> {
        let content = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at LIMIT $1 OFFSET $2",
        )
        .bind(pageable.size as i64)
        .bind(pageable.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;

        Ok(Page::new(content, pageable, total as u64))
    }

    async fn save(&self, entity: &User) -> Result<User, DataError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                email = $2, password_hash = $3, role = $4, status = $5,
                last_login_at = $6, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(entity.id)
        .bind(&entity.email)
        .bind(&entity.password_hash)
        .bind(entity.role)
        .bind(entity.status)
        .bind(entity.last_login_at)
        .fetch_one(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, DataError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, DataError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(total as u64)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DataError> {
        // Email is unique globally, not per-tenant, per the user model.
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, DataError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, tenant_id, email, password_hash, role, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'PENDING', now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_user.tenant_id)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
    }
}
