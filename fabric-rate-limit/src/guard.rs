use fabric_core::guards::{Guard, GuardContext, Identity, PreAuthGuard, PreAuthGuardContext};
use fabric_core::http::response::{IntoResponse, Response};
use fabric_core::AppError;

use crate::RateLimitRegistry;

/// Which part of the request a rate-limit bucket key is derived from.
///
/// Mirrors the gateway's hierarchy of scopes (global, tenant, user, endpoint, ip) —
/// a single `RateLimitGuard`/`PreAuthRateLimitGuard` checks exactly one scope;
/// stacking several guards on a handler builds the hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitKeyKind {
    /// One bucket shared by every request.
    Global,
    /// One bucket per authenticated subject (`identity.sub()`).
    User,
    /// One bucket per `(controller, method)` pair.
    Endpoint,
    /// One bucket per caller IP, read from `X-Forwarded-For` or `X-Real-IP`.
    Ip,
    /// One bucket per arbitrary header value (e.g. `X-Tenant-ID`).
    Header(&'static str),
}

impl RateLimitKeyKind {
    fn resolve_pre_auth(&self, ctx: &PreAuthGuardContext<'_>) -> String {
        match self {
            RateLimitKeyKind::Global => "global".to_string(),
            RateLimitKeyKind::Endpoint => {
                format!("endpoint:{}::{}", ctx.controller_name, ctx.method_name)
            }
            RateLimitKeyKind::Ip => format!("ip:{}", client_ip(ctx.headers)),
            RateLimitKeyKind::Header(name) => {
                let value = ctx
                    .headers
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                format!("header:{name}:{value}")
            }
            RateLimitKeyKind::User => "user:anonymous".to_string(),
        }
    }

    fn resolve<I: Identity>(&self, ctx: &GuardContext<'_, I>) -> String {
        match self {
            RateLimitKeyKind::User => match ctx.identity_sub() {
                Some(sub) => format!("user:{sub}"),
                None => "user:anonymous".to_string(),
            },
            RateLimitKeyKind::Global => "global".to_string(),
            RateLimitKeyKind::Endpoint => {
                format!("endpoint:{}::{}", ctx.controller_name, ctx.method_name)
            }
            RateLimitKeyKind::Ip => format!("ip:{}", client_ip(ctx.headers)),
            RateLimitKeyKind::Header(name) => {
                let value = ctx
                    .headers
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                format!("header:{name}:{value}")
            }
        }
    }
}

fn client_ip(headers: &fabric_core::http::HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

fn rate_limited_response() -> Response {
    AppError::Custom {
        status: fabric_core::http::StatusCode::TOO_MANY_REQUESTS,
        body: serde_json::json!({ "error": "rate limit exceeded" }),
    }
    .into_response()
}

/// Declarative rate-limit parameters, attached via `#[rate_limited(max=5,window=60)]`.
#[derive(Clone, Copy, Debug)]
pub struct RateLimit {
    pub max: u64,
    pub window_secs: u64,
    pub key: RateLimitKeyKind,
}

impl RateLimit {
    pub const fn new(max: u64, window_secs: u64, key: RateLimitKeyKind) -> Self {
        Self {
            max,
            window_secs,
            key,
        }
    }
}

/// Post-authentication rate-limit guard — can key on user identity, headers,
/// endpoint, or IP.
pub struct RateLimitGuard {
    pub registry: RateLimitRegistry,
    pub limit: RateLimit,
}

impl<S: Send + Sync, I: Identity> Guard<S, I> for RateLimitGuard {
    fn check(
        &self,
        _state: &S,
        ctx: &GuardContext<'_, I>,
    ) -> impl std::future::Future<Output = Result<(), Response>> + Send {
        let key = self.limit.key.resolve(ctx);
        let allowed = self
            .registry
            .try_acquire(&key, self.limit.max, self.limit.window_secs);
        std::future::ready(if allowed {
            Ok(())
        } else {
            Err(rate_limited_response())
        })
    }
}

/// Pre-authentication rate-limit guard — for `global`/`ip` scoped buckets that
/// should reject before spending effort on JWT validation.
pub struct PreAuthRateLimitGuard {
    pub registry: RateLimitRegistry,
    pub limit: RateLimit,
}

impl<S: Send + Sync> PreAuthGuard<S> for PreAuthRateLimitGuard {
    fn check(
        &self,
        _state: &S,
        ctx: &PreAuthGuardContext<'_>,
    ) -> impl std::future::Future<Output = Result<(), Response>> + Send {
        let key = self.limit.key.resolve_pre_auth(ctx);
        let allowed = self
            .registry
            .try_acquire(&key, self.limit.max, self.limit.window_secs);
        std::future::ready(if allowed {
            Ok(())
        } else {
            Err(rate_limited_response())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryRateLimiter;

    #[test]
    fn user_key_distinguishes_subjects() {
        let registry = RateLimitRegistry::new(InMemoryRateLimiter::new());
        let limit = RateLimit::new(1, 60, RateLimitKeyKind::User);
        assert!(registry.try_acquire("user:alice", limit.max, limit.window_secs));
        assert!(!registry.try_acquire("user:alice", limit.max, limit.window_secs));
        assert!(registry.try_acquire("user:bob", limit.max, limit.window_secs));
    }

    #[test]
    fn global_key_is_constant() {
        assert_eq!(
            RateLimitKeyKind::Global.resolve_pre_auth(&PreAuthGuardContext {
                method_name: "query",
                controller_name: "RagController",
                headers: &fabric_core::http::HeaderMap::new(),
                uri: &"/rag/query".parse().unwrap(),
                path_params: fabric_core::guards::PathParams::EMPTY,
            }),
            "global"
        );
    }
}
