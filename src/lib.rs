//! multids Library
//!
//! Exposes the multi-datasource registry, the provisioning pipeline and
//! the default-substitution layer for use in integration tests and as a
//! library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::outbound::{MapPropertySource, NativePoolBuilder};
pub use application::{
    BuilderRegistry, PipelineSettings, ProvisioningPipeline, Registry, Resource, Substitution,
};
pub use config::{load_specs, load_tree, AppConfig};
pub use domain::entities::ResourceSpec;
pub use domain::error::{ConfigError, PoolError, ProvisionError};
pub use domain::ports::{PoolBuilder, PropertySource, PooledConnectionProvider, SharedPool};
pub use domain::value_objects::{PoolKind, PoolTuning, ResourceKind, ResourceState};
pub use infrastructure::{SessionFactory, SessionHandle, TransactionCoordinator};
