//! # ragflow-tenancy — tenant entity, repository, and lifecycle service
//!
//! A Tenant is the unit of isolation every other domain crate scopes its data
//! by. This crate owns its CRUD and status transitions; it does not know
//! about documents, users, or conversations beyond the occupancy check it
//! requires before allowing deletion.

pub mod entity;
pub mod repository;
pub mod service;

pub use entity::{ChunkingStrategyName, NewTenant, Tenant, TenantStatus};
pub use repository::{PgTenantRepository, TenantRepository};
pub use service::{TenantOccupancyCheck, TenantService};
