use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, Header, Validation};
use ragflow_core::RagError;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entity::UserRole;
use crate::keys::KeyRing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// The claim set carried by both access and refresh tokens. Refresh tokens
/// additionally use `family_id` to tie a chain of rotations together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
    pub family_id: Option<Uuid>,
}

pub struct IssuedPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_jti: Uuid,
    pub family_id: Uuid,
    pub expires_in: i64,
}

pub struct TokenService {
    keys: Arc<RwLock<KeyRing>>,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(keys: Arc<RwLock<KeyRing>>, issuer: String, audience: String, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self { keys, issuer, audience, access_ttl, refresh_ttl }
    }

    /// JWKS keys can't be returned by reference across the lock guard, so
    /// this hands back an owned JSON value instead.
    pub async fn jwks_json(&self) -> serde_json::Value {
        let ring = self.keys.read().await;
        serde_json::to_value(ring.jwks_json()).expect("jwks serializes")
    }

    /// Issues a fresh access/refresh pair, starting a new rotation family.
    pub async fn issue_pair(&self, user_id: Uuid, tenant_id: Uuid, role: UserRole) -> Result<IssuedPair, RagError> {
        self.issue_pair_for_family(user_id, tenant_id, role, Uuid::new_v4()).await
    }

    /// Issues a new pair within an existing rotation family (used by refresh).
    pub async fn issue_pair_for_family(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role: UserRole,
        family_id: Uuid,
    ) -> Result<IssuedPair, RagError> {
        let now = chrono::Utc::now().timestamp();
        let access_exp = now + self.access_ttl.as_secs() as i64;
        let refresh_exp = now + self.refresh_ttl.as_secs() as i64;

        let access_claims = Claims {
            sub: user_id,
            tenant_id,
            role,
            token_type: TokenType::Access,
            iat: now,
            exp: access_exp,
            jti: Uuid::new_v4(),
            family_id: None,
        };
        let refresh_jti = Uuid::new_v4();
        let refresh_claims = Claims {
            sub: user_id,
            tenant_id,
            role,
            token_type: TokenType::Refresh,
            iat: now,
            exp: refresh_exp,
            jti: refresh_jti,
            family_id: Some(family_id),
        };

        let access_token = self.sign(&access_claims).await?;
        let refresh_token = self.sign(&refresh_claims).await?;

        Ok(IssuedPair {
            access_token,
            refresh_token,
            refresh_jti,
            family_id,
            expires_in: self.access_ttl.as_secs() as i64,
        })
    }

    async fn sign(&self, claims: &Claims) -> Result<String, RagError> {
        let ring = self.keys.read().await;
        let key = ring.current();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid().to_string());
        encode(&header, claims, key.encoding_key()).map_err(|e| RagError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verifies signature, issuer/audience, and expiry. Does not consult the
    /// revocation store or re-check user status — callers that need the full
    /// validate semantics layer that on top.
    pub async fn decode_and_verify(&self, token: &str) -> Result<Claims, RagError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|_| RagError::Unauthenticated("malformed token".into()))?;
        let kid = header.kid.ok_or_else(|| RagError::Unauthenticated("token missing key id".into()))?;

        let decoding_key = {
            let ring = self.keys.read().await;
            ring.decoding_key_for(&kid).ok_or_else(|| RagError::Unauthenticated("unknown signing key".into()))?
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        self.decode_with_key(token, &decoding_key, &validation)
    }

    fn decode_with_key(&self, token: &str, decoding_key: &DecodingKey, validation: &Validation) -> Result<Claims, RagError> {
        decode::<Claims>(token, decoding_key, validation)
            .map(|data| data.claims)
            .map_err(|_| RagError::Unauthenticated("invalid or expired token".into()))
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            Arc::new(RwLock::new(KeyRing::new(2))),
            "ragflow".into(),
            "ragflow-api".into(),
            Duration::from_secs(900),
            Duration::from_secs(86400 * 14),
        )
    }

    #[tokio::test]
    async fn issued_access_token_round_trips() {
        let svc = service();
        let tenant_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let pair = svc.issue_pair(user_id, tenant_id, UserRole::User).await.unwrap();
        let claims = svc.decode_and_verify(&pair.access_token).await.unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.tenant_id, tenant_id);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[tokio::test]
    async fn refresh_token_carries_family_id() {
        let svc = service();
        let pair = svc.issue_pair(Uuid::new_v4(), Uuid::new_v4(), UserRole::User).await.unwrap();
        let claims = svc.decode_and_verify(&pair.refresh_token).await.unwrap();
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.family_id, Some(pair.family_id));
    }

    #[tokio::test]
    async fn tampered_token_fails_verification() {
        let svc = service();
        let pair = svc.issue_pair(Uuid::new_v4(), Uuid::new_v4(), UserRole::User).await.unwrap();
        let mut tampered = pair.access_token.clone();
        tampered.push('x');
        assert!(svc.decode_and_verify(&tampered).await.is_err());
    }
}
