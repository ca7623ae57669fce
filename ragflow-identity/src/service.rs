use std::sync::Arc;
use std::time::Duration;

use ragflow_core::{AuditSink, NewAuditEntry, RagError};
use uuid::Uuid;

use crate::entity::{NewUser, User, UserRole, UserStatus, UserView};
use crate::password;
use crate::refresh::RefreshTokenStore;
use crate::repository::UserRepository;
use crate::token::{TokenService, TokenType};

const GENERIC_LOGIN_FAILURE: &str = "invalid email or password";

pub struct LoginResult {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserView,
}

pub struct ValidationResult {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
}

pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    refresh_store: Arc<RefreshTokenStore>,
    audit: Arc<dyn AuditSink>,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        refresh_store: Arc<RefreshTokenStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { users, tokens, refresh_store, audit }
    }

    pub async fn register(&self, email: String, plaintext_password: String, tenant_id: Uuid) -> Result<UserView, RagError> {
        if !password::is_strong_enough(&plaintext_password) {
            return Err(RagError::InvalidArgument(format!(
                "password must be at least {} characters",
                password::MIN_PASSWORD_LEN
            )));
        }
        if self.users.find_by_email(&email).await.map_err(map_data_err)?.is_some() {
            return Err(RagError::Conflict("an account with this email already exists".into()));
        }

        let password_hash = password::hash_password(plaintext_password).await.map_err(RagError::Internal)?;
        let user = self
            .users
            .create(NewUser { tenant_id, email: email.clone(), password_hash, role: UserRole::User })
            .await
            .map_err(map_data_err)?;

        self.audit.record(
            NewAuditEntry::new(tenant_id, "user.registered", "user", user.id.to_string()).detail("email", email),
        );

        Ok(UserView::from(&user))
    }

    pub async fn login(&self, email: &str, plaintext_password: String) -> Result<LoginResult, RagError> {
        let Some(mut user) = self.users.find_by_email(email).await.map_err(map_data_err)? else {
            return Err(RagError::Unauthenticated(GENERIC_LOGIN_FAILURE.into()));
        };

        let matches = password::verify_password(plaintext_password, user.password_hash.clone())
            .await
            .map_err(RagError::Internal)?;
        if !matches {
            return Err(RagError::Unauthenticated(GENERIC_LOGIN_FAILURE.into()));
        }

        if !matches!(user.status, UserStatus::Active) {
            return Err(RagError::FailedPrecondition("account is not active".into()));
        }

        let pair = self.tokens.issue_pair(user.id, user.tenant_id, user.role).await?;
        self.refresh_store.start_family(user.tenant_id, pair.family_id, user.id, pair.refresh_jti).await?;

        user.last_login_at = Some(chrono::Utc::now());
        let saved = self.users.save(&user).await.map_err(map_data_err)?;

        self.audit.record(NewAuditEntry::new(saved.tenant_id, "user.logged_in", "user", saved.id.to_string()));

        Ok(LoginResult {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            user: UserView::from(&saved),
        })
    }

    /// Rotates a refresh token. A replayed (already-rotated) token revokes
    /// the whole family and every subsequent refresh attempt in it fails.
    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginResult, RagError> {
        let claims = self.tokens.decode_and_verify(refresh_token).await?;
        if claims.token_type != TokenType::Refresh {
            return Err(RagError::Unauthenticated("not a refresh token".into()));
        }
        let family_id = claims.family_id.ok_or_else(|| RagError::Unauthenticated("malformed refresh token".into()))?;

        let user = self
            .users
            .find_by_id(&claims.sub)
            .await
            .map_err(map_data_err)?
            .ok_or_else(|| RagError::Unauthenticated("unknown user".into()))?;
        if !matches!(user.status, UserStatus::Active) {
            return Err(RagError::FailedPrecondition("account is not active".into()));
        }

        let pair = self.tokens.issue_pair_for_family(user.id, user.tenant_id, user.role, family_id).await?;

        if let Err(e) = self.refresh_store.rotate(user.tenant_id, family_id, claims.jti, pair.refresh_jti).await {
            self.audit.record(NewAuditEntry::new(
                user.tenant_id,
                "refresh_token.replay_detected",
                "user",
                user.id.to_string(),
            ));
            return Err(e);
        }

        self.audit.record(NewAuditEntry::new(user.tenant_id, "user.token_refreshed", "user", user.id.to_string()));

        Ok(LoginResult {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            user: UserView::from(&user),
        })
    }

    /// Checks signature, expiry, revocation, and that the user is still
    /// active. Stateful beyond signature/expiry only for those two checks.
    pub async fn validate(&self, token: &str) -> Result<ValidationResult, RagError> {
        let claims = self.tokens.decode_and_verify(token).await?;
        if self.refresh_store.is_revoked(claims.tenant_id, claims.jti).await? {
            return Err(RagError::Unauthenticated("token has been revoked".into()));
        }
        let user = self
            .users
            .find_by_id(&claims.sub)
            .await
            .map_err(map_data_err)?
            .ok_or_else(|| RagError::Unauthenticated("unknown user".into()))?;
        if !matches!(user.status, UserStatus::Active) {
            return Err(RagError::Unauthenticated("account is not active".into()));
        }
        Ok(ValidationResult { user_id: claims.sub, tenant_id: claims.tenant_id, role: claims.role })
    }

    /// Revokes a single token by id, with TTL bounded to its own remaining
    /// lifetime rather than the service's full refresh TTL.
    pub async fn revoke(&self, token: &str) -> Result<(), RagError> {
        let claims = self.tokens.decode_and_verify(token).await?;
        let remaining = (claims.exp - chrono::Utc::now().timestamp()).max(1);
        self.refresh_store.revoke_token(claims.tenant_id, claims.jti, Duration::from_secs(remaining as u64)).await?;
        if let Some(family_id) = claims.family_id {
            self.refresh_store.revoke_family(claims.tenant_id, family_id).await?;
        }
        self.audit.record(NewAuditEntry::new(claims.tenant_id, "token.revoked", "user", claims.sub.to_string()));
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
    use async_trait::async_trait;
    use fabric_data::{DataError, Page, Pageable, Repository};
    use ragflow_core::InMemoryAuditSink;
    use ragflow_storage::InMemoryKvStore;
    use tokio::sync::RwLock as TokioRwLock;

    #[derive(Default)]
    struct FakeUsers {
        users: TokioRwLock<Vec<User>>,
    }

    #[async_trait]
    impl Repository<User, Uuid> for FakeUsers {
        async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, DataError> {
            Ok(self.users.read().await.iter().find(|u| &u.id == id).cloned())
        }
        async fn find_all(&self) -> Result<Vec<User>, DataError> {
            Ok(self.users.read().await.clone())
        }
        async fn find_all_paged(&self, pageable: &Pageable) -> Result<Page<User>, DataError> {
            let all = self.users.read().await.clone();
            Ok(Page::new(all.clone(), pageable, all.len() as u64))
        }
        async fn save(&self, entity: &User) -> Result<User, DataError> {
            let mut guard = self.users.write().await;
            if let Some(existing) = guard.iter_mut().find(|u| u.id == entity.id) {
                *existing = entity.clone();
            }
            Ok(entity.clone())
        }
        async fn delete(&self, id: &Uuid) -> Result<bool, DataError> {
            let mut guard = self.users.write().await;
            let before = guard.len();
            guard.retain(|u| &u.id != id);
            Ok(guard.len() != before)
        }
        async fn count(&self) -> Result<u64, DataError> {
            Ok(self.users.read().await.len() as u64)
        }
    }

    #[async_trait]
    impl UserRepository for FakeUsers {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, DataError> {
            Ok(self.users.read().await.iter().find(|u| u.email == email).cloned())
        }
        async fn create(&self, new_user: NewUser) -> Result<User, DataError> {
            let now = chrono::Utc::now();
            let user = User {
                id: Uuid::new_v4(),
                tenant_id: new_user.tenant_id,
                email: new_user.email,
                password_hash: new_user.password_hash,
                role: new_user.role,
                status: UserStatus::Active,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            };
            self.users.write().await.push(user.clone());
            Ok(user)
        }
    }

    fn service() -> IdentityService {
        let keys = Arc::new(TokioRwLock::new(crate::keys::KeyRing::new(2)));
        let tokens = Arc::new(TokenService::new(
            keys,
            "ragflow".into(),
            "ragflow-api".into(),
            Duration::from_secs(900),
            Duration::from_secs(86400 * 14),
        ));
        let refresh_store = Arc::new(RefreshTokenStore::new(Arc::new(InMemoryKvStore::new()), Duration::from_secs(86400 * 14)));
        IdentityService::new(Arc::new(FakeUsers::default()), tokens, refresh_store, Arc::new(InMemoryAuditSink::new()))
    }

    #[tokio::test]
    async fn register_then_login_succeeds() {
        let svc = service();
        let tenant_id = Uuid::new_v4();
        svc.register("a@x.io".into(), "correct-horse-battery-staple".into(), tenant_id).await.unwrap();
        let result = svc.login("a@x.io", "correct-horse-battery-staple".into()).await.unwrap();
        assert_eq!(result.user.tenant_id, tenant_id);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let svc = service();
        let tenant_id = Uuid::new_v4();
        svc.register("a@x.io".into(), "correct-horse-battery-staple".into(), tenant_id).await.unwrap();
        let err = svc.register("a@x.io".into(), "another-long-password".into(), tenant_id).await.unwrap_err();
        assert!(matches!(err, RagError::Conflict(_)));
    }

    #[tokio::test]
    async fn login_fails_identically_for_unknown_email_and_wrong_password() {
        let svc = service();
        let tenant_id = Uuid::new_v4();
        svc.register("a@x.io".into(), "correct-horse-battery-staple".into(), tenant_id).await.unwrap();

        let unknown = svc.login("nobody@x.io", "whatever-long-enough".into()).await.unwrap_err();
        let wrong = svc.login("a@x.io", "totally-wrong-password".into()).await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn refresh_rotation_then_replay_fails() {
        let svc = service();
        let tenant_id = Uuid::new_v4();
        svc.register("a@x.io".into(), "correct-horse-battery-staple".into(), tenant_id).await.unwrap();
        let login = svc.login("a@x.io", "correct-horse-battery-staple".into()).await.unwrap();

        let refreshed = svc.refresh(&login.refresh_token).await.unwrap();
        assert_ne!(refreshed.refresh_token, login.refresh_token);

        let replay = svc.refresh(&login.refresh_token).await.unwrap_err();
        assert!(matches!(replay, RagError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn validate_succeeds_for_fresh_access_token() {
        let svc = service();
        let tenant_id = Uuid::new_v4();
        svc.register("a@x.io".into(), "correct-horse-battery-staple".into(), tenant_id).await.unwrap();
        let login = svc.login("a@x.io", "correct-horse-battery-staple".into()).await.unwrap();
        let validated = svc.validate(&login.access_token).await.unwrap();
        assert_eq!(validated.tenant_id, tenant_id);
    }

    #[tokio::test]
    async fn validate_fails_after_revoke() {
        let svc = service();
        let tenant_id = Uuid::new_v4();
        svc.register("a@x.io".into(), "correct-horse-battery-staple".into(), tenant_id).await.unwrap();
        let login = svc.login("a@x.io", "correct-horse-battery-staple".into()).await.unwrap();
        svc.revoke(&login.access_token).await.unwrap();
        let err = svc.validate(&login.access_token).await.unwrap_err();
        assert!(matches!(err, RagError::Unauthenticated(_)));
    }
}
