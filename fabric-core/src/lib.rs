pub mod beans;
pub mod builder;
pub mod config;
pub mod controller;
pub mod dev;
pub mod error;
pub mod guards;
pub mod health;
pub mod http;
pub mod interceptors;
pub mod layers;
pub mod lifecycle;
pub mod managed;
pub mod meta;
pub mod plugin;
pub mod plugins;
pub mod prelude;
pub mod request_id;
pub mod secure_headers;
pub mod service;
pub mod sse;
pub mod state;
pub mod type_list;
pub mod types;
#[cfg(feature = "validation")]
pub mod validation;
#[cfg(feature = "multipart")]
pub mod multipart;
#[cfg(feature = "ws")]
pub mod ws;

pub use beans::{AsyncBean, Bean, BeanContext, BeanError, BeanRegistry, BeanState, Producer};
pub use builder::{AppBuilder, TaskRegistryHandle};
pub use config::{
    ConfigError, ConfigProperties, ConfigValidationError, ConfigValue, DefaultSecretResolver,
    FromConfigValue, MissingKeyError, PropertyMeta, FabricConfig, RegisteredSection, SecretResolver,
    register_section, registered_sections, validate_keys, validate_section,
};
pub use controller::{Controller, StatefulConstruct};
pub use error::{AppError, HttpError};
pub use guards::{Guard, GuardContext, Identity, NoIdentity, PathParams, PreAuthGuard, PreAuthGuardContext, RolesGuard};
pub use interceptors::{Cacheable, Interceptor, InterceptorContext};
pub use layers::{default_cors, default_trace, init_tracing};
pub use lifecycle::LifecycleController;
#[allow(deprecated)]
pub use plugin::{
    DeferredAction, DeferredContext, DeferredInstallContext, DeferredPlugin,
    DeferredPluginInstaller, Plugin, PreStatePlugin,
};
pub use managed::{ManagedErr, ManagedError, ManagedResource};
pub use meta::MetaRegistry;
pub use plugins::AdvancedHealth;
pub use request_id::{RequestId, RequestIdPlugin};
pub use secure_headers::SecureHeaders;
pub use service::ServiceComponent;
pub use state::FabricState;
pub use type_list::{BuildableFrom, Contains, Here, TCons, TNil, There};

pub use schemars;
