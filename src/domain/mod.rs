//! Domain Layer
//!
//! Data-source specs, resource naming, error taxonomy and the ports the
//! provisioning pipeline is written against.

pub mod entities;
pub mod error;
pub mod naming;
pub mod ports;
pub mod value_objects;

pub use entities::{ConnectionParams, ResourceSpec};
pub use error::{Cause, ConfigError, PoolError, ProvisionError};
pub use value_objects::{PoolKind, PoolTuning, ResourceKind, ResourceState, TuningOverrides};
