//! Refresh-token rotation and the revocation set, both backed by the shared
//! KV adapter per the "revocation set ... single shared KV namespace per
//! tenant" rule — writers use `incr_by`/compare-like patterns rather than
//! naive read-modify-write.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ragflow_core::RagError;
use ragflow_storage::{tenant_key, KvStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FamilyState {
    user_id: Uuid,
    current_jti: Uuid,
    generation: u32,
    revoked: bool,
}

pub struct RefreshTokenStore {
    kv: Arc<dyn KvStore>,
    refresh_ttl: Duration,
}

impl RefreshTokenStore {
    pub fn new(kv: Arc<dyn KvStore>, refresh_ttl: Duration) -> Self {
        Self { kv, refresh_ttl }
    }

    fn family_key(&self, tenant_id: Uuid, family_id: Uuid) -> String {
        tenant_key(tenant_id, &format!("refresh-family:{family_id}"))
    }

    fn revocation_key(&self, tenant_id: Uuid, jti: Uuid) -> String {
        tenant_key(tenant_id, &format!("revoked-token:{jti}"))
    }

    pub async fn start_family(&self, tenant_id: Uuid, family_id: Uuid, user_id: Uuid, jti: Uuid) -> Result<(), RagError> {
        let state = FamilyState { user_id, current_jti: jti, generation: 0, revoked: false };
        self.put_family(tenant_id, family_id, &state).await
    }

    /// Validates a presented refresh token's `jti` against the family's
    /// expected current one. On success, rotates to `new_jti`. On replay
    /// (a `jti` that doesn't match, meaning the token was already rotated
    /// away from or the family was already flagged stolen), revokes the
    /// whole family and fails.
    pub async fn rotate(&self, tenant_id: Uuid, family_id: Uuid, presented_jti: Uuid, new_jti: Uuid) -> Result<(), RagError> {
        let mut state = self
            .get_family(tenant_id, family_id)
            .await?
            .ok_or_else(|| RagError::Unauthenticated("unknown refresh token family".into()))?;

        if state.revoked {
            return Err(RagError::Unauthenticated("refresh token family revoked".into()));
        }

        if state.current_jti != presented_jti {
            state.revoked = true;
            self.put_family(tenant_id, family_id, &state).await?;
            tracing::warn!(tenant_id = %tenant_id, family_id = %family_id, "refresh token replay detected, revoking family");
            return Err(RagError::Unauthenticated("refresh token reuse detected".into()));
        }

        state.current_jti = new_jti;
        state.generation += 1;
        self.put_family(tenant_id, family_id, &state).await
    }

    pub async fn revoke_family(&self, tenant_id: Uuid, family_id: Uuid) -> Result<(), RagError> {
        if let Some(mut state) = self.get_family(tenant_id, family_id).await? {
            state.revoked = true;
            self.put_family(tenant_id, family_id, &state).await?;
        }
        Ok(())
    }

    async fn get_family(&self, tenant_id: Uuid, family_id: Uuid) -> Result<Option<FamilyState>, RagError> {
        let key = self.family_key(tenant_id, family_id);
        match self.kv.get(&key).await.map_err(|e| RagError::Unavailable(e.to_string()))? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| RagError::Internal(format!("corrupt refresh family state: {e}"))),
            None => Ok(None),
        }
    }

    async fn put_family(&self, tenant_id: Uuid, family_id: Uuid, state: &FamilyState) -> Result<(), RagError> {
        let key = self.family_key(tenant_id, family_id);
        let bytes = Bytes::from(serde_json::to_vec(state).expect("family state serializes"));
        self.kv.set(&key, bytes, Some(self.refresh_ttl)).await.map_err(|e| RagError::Unavailable(e.to_string()))
    }

    /// Adds `jti` to the revocation set with TTL equal to the token's
    /// remaining lifetime, not the full token TTL.
    pub async fn revoke_token(&self, tenant_id: Uuid, jti: Uuid, remaining: Duration) -> Result<(), RagError> {
        let key = self.revocation_key(tenant_id, jti);
        self.kv
            .set(&key, Bytes::from_static(b"1"), Some(remaining))
            .await
            .map_err(|e| RagError::Unavailable(e.to_string()))
    }

    pub async fn is_revoked(&self, tenant_id: Uuid, jti: Uuid) -> Result<bool, RagError> {
        let key = self.revocation_key(tenant_id, jti);
        Ok(self.kv.get(&key).await.map_err(|e| RagError::Unavailable(e.to_string()))?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragflow_storage::InMemoryKvStore;

    fn store() -> RefreshTokenStore {
        RefreshTokenStore::new(Arc::new(InMemoryKvStore::new()), Duration::from_secs(86400))
    }

    #[tokio::test]
    async fn rotation_succeeds_once_then_fails_on_replay() {
        let store = store();
        let tenant_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let family_id = Uuid::new_v4();
        let jti1 = Uuid::new_v4();
        let jti2 = Uuid::new_v4();
        let jti3 = Uuid::new_v4();

        store.start_family(tenant_id, family_id, user_id, jti1).await.unwrap();
        store.rotate(tenant_id, family_id, jti1, jti2).await.unwrap();

        // Replaying jti1 (already rotated away from) must fail and kill the family.
        let err = store.rotate(tenant_id, family_id, jti1, jti3).await.unwrap_err();
        assert!(matches!(err, RagError::Unauthenticated(_)));

        // The family is now dead even for the legitimate current jti.
        let err2 = store.rotate(tenant_id, family_id, jti2, jti3).await.unwrap_err();
        assert!(matches!(err2, RagError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn revoked_token_is_reported() {
        let store = store();
        let tenant_id = Uuid::new_v4();
        let jti = Uuid::new_v4();
        assert!(!store.is_revoked(tenant_id, jti).await.unwrap());
        store.revoke_token(tenant_id, jti, Duration::from_secs(60)).await.unwrap();
        assert!(store.is_revoked(tenant_id, jti).await.unwrap());
    }
}
