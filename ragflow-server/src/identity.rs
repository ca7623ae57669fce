//! The caller identity extracted from a validated access token.
//!
//! Deliberately bypasses `fabric_security`'s `JwtClaimsValidator` /
//! `ClaimsIdentity` stack: `ragflow_identity::IdentityService::validate`
//! already checks signature, expiry, revocation, and account status in one
//! call, and a generic JWT validator sitting in front of it would either
//! duplicate that work or — if wired independently of the revocation
//! store — accept a token this service has already revoked. Only the
//! Bearer-token parsing helper is reused from `fabric-security`.

use std::sync::Arc;

use fabric_core::guards::Identity;
use fabric_core::http::extract::{FromRef, FromRequestParts};
use fabric_core::http::header::Parts;
use ragflow_core::RagError;
use ragflow_identity::{IdentityService, UserRole};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RagIdentity {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
    sub: String,
    roles: Vec<String>,
}

impl RagIdentity {
    fn new(user_id: Uuid, tenant_id: Uuid, role: UserRole) -> Self {
        let role_name = match role {
            UserRole::Admin => "admin",
            UserRole::User => "user",
            UserRole::Reader => "reader",
        };
        Self { user_id, tenant_id, role, sub: user_id.to_string(), roles: vec![role_name.to_string()] }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

impl Identity for RagIdentity {
    fn sub(&self) -> &str {
        &self.sub
    }

    fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl<S> FromRequestParts<S> for RagIdentity
where
    S: Send + Sync,
    Arc<IdentityService>: FromRef<S>,
{
    type Rejection = RagError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = fabric_security::extractor::extract_bearer_token_from_parts(parts)
            .map_err(|e| RagError::Unauthenticated(e.to_string()))?;
        let identity_service = Arc::<IdentityService>::from_ref(state);
        let result = identity_service.validate(token).await?;
        Ok(RagIdentity::new(result.user_id, result.tenant_id, result.role))
    }
}
