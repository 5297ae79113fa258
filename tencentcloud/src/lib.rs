//! Tencent Cloud bindings for the `reconcile` engine
//!
//! [`StateService`] submits mutating actions through [`api::Client`] and
//! waits for the affected resource using the describe action and status
//! vocabulary of its [`ResourceFamily`].

pub mod api;
pub mod config;
pub mod families;
pub mod service;
pub mod taxonomy;

pub use config::{ConfigError, ProviderConfig};
pub use families::{FamilyError, FamilyRegistry, ResourceFamily};
pub use service::{IdSource, ServiceError, StateService};
pub use taxonomy::ErrorTaxonomy;
