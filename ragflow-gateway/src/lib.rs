//! # ragflow-gateway — edge hardening logic
//!
//! Pure, HTTP-framework-agnostic pieces of the edge gateway from §4.1: input
//! hardening, the hierarchical rate-limit check and its KV-backed shared
//! bucket, a circuit breaker for guarded downstream dependencies, and the
//! claimed-vs-header tenant cross-check. Axum `Guard`/`PreAuthGuard` wiring,
//! `fabric_core::secure_headers::SecureHeaders` installation, and the actual
//! request/response plumbing all live in `ragflow-server`.

pub mod circuit_breaker;
pub mod rate_limit;
pub mod tenant_guard;
pub mod validation;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use rate_limit::{check_hierarchy, KvRateLimitBackend, RateLimitScope, ScopeLimit, ScopedRateLimitBackend, SCOPE_ORDER};
pub use tenant_guard::check_tenant_header;
pub use validation::{check_header, check_path_segment, check_request_size, check_text_field, ValidationViolation};
