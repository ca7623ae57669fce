//! Shared, multi-instance rate-limit buckets backed by the tenant KV store
//! (§4.1's hierarchical scopes: global, tenant, user, endpoint, ip). Falls
//! back to an in-process limiter when the KV store is unavailable — rate
//! limiting may degrade, it must never block auth.
//!
//! `KvStore` is async and `fabric_rate_limit::RateLimitBackend::try_acquire`
//! is sync, so this doesn't implement that trait directly — `ragflow-server`
//! calls [`KvRateLimitBackend::try_acquire`] from its own async `Guard` impls
//! instead of going through `fabric_rate_limit::RateLimitGuard`.

use std::sync::Arc;

use async_trait::async_trait;
use fabric_rate_limit::InMemoryRateLimiter;
use ragflow_storage::KvStore;
use uuid::Uuid;

/// Anything that can answer a scoped rate-limit check asynchronously. Exists
/// so [`check_hierarchy`] can be exercised with a stub in tests without
/// touching a real `KvStore`.
#[async_trait]
pub trait ScopedRateLimitBackend: Send + Sync {
    async fn try_acquire(&self, key: &str, max: u64, window_secs: u64) -> bool;
}

#[async_trait]
impl ScopedRateLimitBackend for KvRateLimitBackend {
    async fn try_acquire(&self, key: &str, max: u64, window_secs: u64) -> bool {
        KvRateLimitBackend::try_acquire(self, key, max, window_secs).await
    }
}

/// Tenant-scoped rate limit backend that consumes tokens from
/// `KvStore::incr_by` buckets, so a noisy tenant can't starve another's
/// allowance. On any KV error, serves the request from an in-process
/// fallback limiter instead of rejecting it.
pub struct KvRateLimitBackend {
    kv: Arc<dyn KvStore>,
    tenant_id: Uuid,
    fallback: InMemoryRateLimiter,
}

impl KvRateLimitBackend {
    pub fn new(kv: Arc<dyn KvStore>, tenant_id: Uuid) -> Self {
        Self { kv, tenant_id, fallback: InMemoryRateLimiter::new() }
    }

    fn key(&self, key: &str) -> String {
        ragflow_storage::tenant_key(self.tenant_id, &format!("rate-limit:{key}"))
    }

    pub async fn try_acquire(&self, key: &str, max: u64, window_secs: u64) -> bool {
        let kv_key = self.key(key);
        let window = std::time::Duration::from_secs(window_secs);
        match self.kv.incr_by(&kv_key, 1, Some(window)).await {
            Ok(count) => count as u64 <= max,
            Err(err) => {
                tracing::warn!(error = %err, "kv rate limit backend unavailable, degrading to in-process limiter");
                self.fallback.try_acquire(key, max, window_secs)
            }
        }
    }
}

/// The hierarchical scopes rate limits are enforced across, in evaluation
/// order. A request must clear every scope that applies to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RateLimitScope {
    Global,
    Tenant,
    User,
    Endpoint,
    Ip,
}

pub const SCOPE_ORDER: [RateLimitScope; 5] = [
    RateLimitScope::Global,
    RateLimitScope::Tenant,
    RateLimitScope::User,
    RateLimitScope::Endpoint,
    RateLimitScope::Ip,
];

/// One configured limit in the hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct ScopeLimit {
    pub scope: RateLimitScope,
    pub max: u64,
    pub window_secs: u64,
}

/// Evaluates scopes in order, admin bypass for everything but `Global`,
/// explicit IP allow/deny lists checked first. Returns the first scope that
/// rejected the request, or `None` if every applicable scope admitted it.
pub async fn check_hierarchy(
    backend: &dyn ScopedRateLimitBackend,
    limits: &[ScopeLimit],
    keys: impl Fn(RateLimitScope) -> String,
    is_admin: bool,
    ip_denied: bool,
) -> Option<RateLimitScope> {
    if ip_denied {
        return Some(RateLimitScope::Ip);
    }
    for limit in limits {
        if is_admin && limit.scope != RateLimitScope::Global {
            continue;
        }
        let key = keys(limit.scope);
        if !backend.try_acquire(&key, limit.max, limit.window_secs).await {
            return Some(limit.scope);
        }
    }
    None
}
