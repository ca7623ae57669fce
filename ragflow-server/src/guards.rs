//! Request guards wiring `ragflow-gateway`'s pure logic into the Axum
//! request path (§4.1): the claimed-vs-header tenant cross-check and the
//! hierarchical rate limit.

use fabric_core::guards::{Guard, GuardContext};
use fabric_core::http::response::{IntoResponse, Response};
use ragflow_gateway::{check_hierarchy, check_tenant_header, KvRateLimitBackend, RateLimitScope, ScopeLimit};

use crate::identity::RagIdentity;
use crate::state::AppState;

/// Rejects a request whose `X-Tenant-ID` header disagrees with the
/// authenticated caller's tenant claim.
pub struct TenantHeaderGuard;

impl Guard<AppState, RagIdentity> for TenantHeaderGuard {
    async fn check(&self, _state: &AppState, ctx: &GuardContext<'_, RagIdentity>) -> Result<(), Response> {
        let Some(identity) = ctx.identity else {
            return Ok(());
        };
        let header_value = ctx.headers.get("x-tenant-id").and_then(|v| v.to_str().ok());
        check_tenant_header(identity.tenant_id, header_value).map_err(|e| e.into_response())
    }
}

/// The default hierarchical rate limit applied to authenticated endpoints:
/// a per-tenant ceiling followed by a per-user ceiling, evaluated against
/// the shared KV-backed bucket for the caller's tenant. Admins bypass every
/// scope but `Global`, per `check_hierarchy`'s own rule.
pub struct TenantRateLimitGuard;

const TENANT_LIMITS: &[ScopeLimit] = &[
    ScopeLimit { scope: RateLimitScope::Tenant, max: 600, window_secs: 60 },
    ScopeLimit { scope: RateLimitScope::User, max: 120, window_secs: 60 },
];

impl Guard<AppState, RagIdentity> for TenantRateLimitGuard {
    async fn check(&self, state: &AppState, ctx: &GuardContext<'_, RagIdentity>) -> Result<(), Response> {
        let Some(identity) = ctx.identity else {
            return Ok(());
        };
        let backend = KvRateLimitBackend::new(state.kv.clone(), identity.tenant_id);
        let endpoint = ctx.method_name;
        let rejected = check_hierarchy(
            &backend,
            TENANT_LIMITS,
            |scope| match scope {
                RateLimitScope::Tenant => format!("tenant:{endpoint}"),
                RateLimitScope::User => format!("user:{}:{endpoint}", identity.user_id),
                _ => format!("{scope:?}:{endpoint}"),
            },
            identity.is_admin(),
            false,
        )
        .await;

        match rejected {
            Some(scope) => {
                Err(ragflow_core::RagError::RateLimited(format!("rate limit exceeded at {scope:?} scope")).into_response())
            }
            None => Ok(()),
        }
    }
}
