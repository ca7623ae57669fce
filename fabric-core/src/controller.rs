use std::any::Any;
use std::future::Future;
use std::pin::Pin;

use crate::config::{FabricConfig, MissingKeyError};
use crate::meta::MetaRegistry;

/// Implemented by every `#[derive(Controller)]` / `#[routes]` struct.
///
/// Generated by the `fabric-macros` codegen — you should not implement this
/// by hand. `S` is the application state type the controller was declared
/// against (`#[controller(state = S)]`).
pub trait Controller<S> {
    /// Build the `axum::Router<S>` fragment for this controller's routes,
    /// nested under its `#[controller(path = "...")]` prefix.
    fn routes() -> crate::http::Router<S>;

    /// Push this controller's [`RouteInfo`](crate::meta::RouteInfo) entries
    /// (and any other typed metadata) into the shared registry.
    fn register_meta(registry: &mut MetaRegistry);

    /// Wrap pre-authentication-guarded routes with their guard middleware.
    ///
    /// Only overridden when at least one route carries `#[pre_guard(...)]`;
    /// the default is a no-op passthrough.
    fn apply_pre_auth_guards(router: crate::http::Router<S>, _state: &S) -> crate::http::Router<S> {
        router
    }

    /// Subscribe this controller's `#[consumer]` methods to their event buses.
    ///
    /// Only overridden when the controller declares at least one consumer;
    /// the default does nothing.
    fn register_consumers(_state: S) -> Pin<Box<dyn Future<Output = ()> + Send>>
    where
        S: 'static,
    {
        Box::pin(async {})
    }

    /// Collect this controller's `#[scheduled]` methods as type-erased tasks
    /// for the scheduler plugin to pick up.
    ///
    /// Only overridden when the controller declares at least one scheduled
    /// method; the default returns no tasks.
    fn scheduled_tasks_boxed(_state: &S) -> Vec<Box<dyn Any + Send>> {
        Vec::new()
    }

    /// Validate that every config key this controller depends on (via
    /// `#[config(...)]` fields or `#[config_section]` structs) is present.
    fn validate_config(config: &FabricConfig) -> Vec<MissingKeyError>;
}

/// Implemented for controllers that can be constructed directly from the
/// application state — used by event consumers and scheduled tasks, which
/// need a fresh controller instance outside of the normal Axum extraction
/// path (there is no request to extract `#[inject(identity)]` fields from).
///
/// Only generated when the controller has no identity fields.
pub trait StatefulConstruct<S> {
    fn from_state(state: &S) -> Self;
}
