//! Error types
//!
//! Every provisioning failure is startup-fatal. Messages carry the resource
//! name, its kind and the underlying cause.

use crate::domain::value_objects::ResourceKind;
use std::sync::Arc;

/// Shared underlying cause. `Arc` keeps [`ProvisionError`] cloneable so a
/// one-time guard can hand the first outcome to every caller.
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// Wrap any error as a [`Cause`].
pub fn cause<E>(err: E) -> Cause
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(err)
}

/// Structural configuration errors, detected before anything is built.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("data source at data-sources[{index}] has an empty name")]
    EmptyName { index: usize },

    #[error("duplicate data source name `{name}`: data-sources[{first}] and data-sources[{second}]")]
    DuplicateName {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("failed to read configuration {path}: {message}")]
    Read { path: String, message: String },

    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Fatal provisioning errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("{entry} conflicts with an already registered pool named `{name}`")]
    DuplicateName { name: String, entry: String },

    #[error("unsupported pool kind `{kind}` for data source `{name}` (available: {available})")]
    UnsupportedKind {
        name: String,
        kind: String,
        available: String,
    },

    #[error("no pool builder available for data source `{name}` (probed: {probed})")]
    NoBuilderAvailable { name: String, probed: String },

    #[error("failed to provision {kind} for `{name}`: {source}")]
    Provisioning {
        name: String,
        kind: ResourceKind,
        #[source]
        source: Cause,
    },

    #[error("{kind} `{name}` is expected but was never provisioned")]
    MissingProvisionedResource { kind: ResourceKind, name: String },

    #[error("failed to bind tuning properties under `{prefix}` for pool `{name}`: {message}")]
    PropertyBinding {
        name: String,
        prefix: String,
        message: String,
    },
}

impl ProvisionError {
    /// Wrap a construction failure with the resource it belongs to.
    pub fn provisioning<E>(kind: ResourceKind, name: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Provisioning {
            name: name.into(),
            kind,
            source: cause(source),
        }
    }
}

/// Errors raised by pool implementations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("invalid connection url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid pool tuning: {0}")]
    InvalidTuning(String),

    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(std::time::Duration),

    #[error("connection error: {0}")]
    Connect(#[from] rusqlite::Error),

    #[error("validation query `{query}` failed: {source}")]
    Validation {
        query: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("pool backend error: {0}")]
    Backend(String),
}
