//! FABRIC — a Quarkus-like ergonomic layer over Axum.
//!
//! This facade crate re-exports all FABRIC sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use fabric::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature       | Default | Crate                     |
//! |---------------|---------|---------------------------|
//! | `security`    | **yes** | `fabric-security`            |
//! | `events`      | **yes** | `fabric-events`              |
//! | `utils`       | **yes** | `fabric-utils`               |
//! | `data`        | no      | `fabric-data` (abstractions) |
//! | `data-sqlx`   | no      | `fabric-data-sqlx`           |
//! | `sqlite`      | no      | `fabric-data-sqlx/sqlite`    |
//! | `postgres`    | no      | `fabric-data-sqlx/postgres`  |
//! | `mysql`       | no      | `fabric-data-sqlx/mysql`     |
//! | `scheduler`   | no      | `fabric-scheduler`           |
//! | `cache`       | no      | `fabric-cache`               |
//! | `rate-limit`  | no      | `fabric-rate-limit`          |
//! | `openapi`     | no      | `fabric-openapi`             |
//! | `prometheus`  | no      | `fabric-prometheus`          |
//! | `validation`  | no      | `fabric-core/validation`     |
//! | `full`        | no      | All of the above          |

// Re-export sub-crates as public modules so they're accessible as
// `fabric::fabric_core`, `fabric::fabric_events`, etc.
//
// The proc macros use `proc-macro-crate` to detect whether the user depends
// on `fabric` (facade) or individual crates, and generate the correct paths.
pub extern crate fabric_core;
pub extern crate fabric_macros;

#[cfg(feature = "rate-limit")]
pub extern crate fabric_rate_limit;

// Re-export everything from fabric-core at the top level for convenience.
pub use fabric_core::*;

#[cfg(feature = "security")]
pub use fabric_security;

#[cfg(feature = "events")]
pub use fabric_events;

#[cfg(feature = "utils")]
pub use fabric_utils;

#[cfg(feature = "data")]
pub use fabric_data;

#[cfg(feature = "data-sqlx")]
pub use fabric_data_sqlx;

#[cfg(feature = "scheduler")]
pub use fabric_scheduler;

#[cfg(feature = "cache")]
pub use fabric_cache;

#[cfg(feature = "openapi")]
pub use fabric_openapi;

#[cfg(feature = "prometheus")]
pub use fabric_prometheus;

#[cfg(feature = "observability")]
pub use fabric_observability;

/// Convenience type aliases that depend on types from optional sub-crates.
pub mod types {
    pub use fabric_core::types::*;

    /// Paginated JSON result — `Result<Json<Page<T>>, AppError>`.
    ///
    /// Available when the `data` feature is enabled.
    ///
    /// ```ignore
    /// #[get("/users")]
    /// async fn list(&self, pageable: Pageable) -> PagedResult<User> {
    ///     Ok(Json(self.service.list(pageable).await?))
    /// }
    /// ```
    #[cfg(feature = "data")]
    pub type PagedResult<T> =
        Result<fabric_core::http::Json<fabric_data::Page<T>>, fabric_core::AppError>;
}

/// Unified prelude — import everything with `use fabric::prelude::*`.
///
/// Includes the core prelude plus types from all enabled feature crates.
pub mod prelude {
    pub use fabric_core::prelude::*;
    pub use crate::types::*;

    #[cfg(feature = "security")]
    pub use fabric_security::prelude::*;

    #[cfg(feature = "data")]
    pub use fabric_data::prelude::*;

    #[cfg(feature = "data-sqlx")]
    pub use fabric_data_sqlx::prelude::*;

    #[cfg(feature = "events")]
    pub use fabric_events::prelude::*;

    #[cfg(feature = "utils")]
    pub use fabric_utils::prelude::*;
}
