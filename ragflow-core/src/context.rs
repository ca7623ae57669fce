//! The request-scoped identity every domain crate threads through its calls:
//! which tenant, which user, and under which role. Built once by the gateway
//! from validated bearer-token claims and passed by value from there on —
//! nothing downstream re-derives it from a token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role carried by a validated token, coarse-grained across the whole
/// platform rather than per-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
    Reader,
}

impl Role {
    /// Admin-role tokens bypass user/tenant rate-limit buckets but never
    /// the global one, and never bypass authentication itself.
    pub fn bypasses_scoped_rate_limits(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The tenant/user/role triple extracted from a validated access token,
/// scoping every downstream data access and event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid, user_id: Uuid, role: Role) -> Self {
        Self { tenant_id, user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}
