//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pool implementation tag.
///
/// Each variant corresponds to one registered pool builder. When a data
/// source does not name a kind, builders are probed in [`PoolKind::PROBE_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolKind {
    /// r2d2 generic pool over `r2d2_sqlite`
    R2d2,
    /// In-crate pool (`infrastructure::connection_pool`)
    Native,
}

impl PoolKind {
    /// Probe order used when a data source leaves `kind` unset.
    /// r2d2 is preferred over the native pool when both are compiled in.
    pub const PROBE_ORDER: [PoolKind; 2] = [PoolKind::R2d2, PoolKind::Native];

    /// Parse a kind tag from configuration.
    ///
    /// Returns `None` for unknown tags; callers turn that into an
    /// unsupported-kind error at build time.
    ///
    /// # Examples
    /// ```
    /// use multids::domain::value_objects::PoolKind;
    ///
    /// assert_eq!(PoolKind::from_tag("R2D2"), Some(PoolKind::R2d2));
    /// assert_eq!(PoolKind::from_tag("hikari"), None);
    /// ```
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "r2d2" => Some(Self::R2d2),
            "native" => Some(Self::Native),
            _ => None,
        }
    }

    /// Short name used in property prefixes (`...[0].r2d2`).
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::R2d2 => "r2d2",
            Self::Native => "native",
        }
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// The four kinds of resource held by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pool,
    Coordinator,
    SessionFactory,
    SessionHandle,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Pool,
        ResourceKind::Coordinator,
        ResourceKind::SessionFactory,
        ResourceKind::SessionHandle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pool => "pool",
            Self::Coordinator => "transaction coordinator",
            Self::SessionFactory => "session factory",
            Self::SessionHandle => "session handle",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a (kind, name) pair as seen by the substitution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Not in the registry
    Unseen,
    /// Inserted by a provisioner, not yet handed out
    Provisioned,
    /// Handed to a consumer; further lookups return the same instance
    Substituted,
}

/// Effective tuning of a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolTuning {
    /// Maximum connections held by the pool
    pub max_size: u32,
    /// Idle connections to keep open (None = pool default)
    pub min_idle: Option<u32>,
    /// How long `get` waits for a free connection
    pub connection_timeout: Duration,
    /// Close connections idle for longer than this
    pub idle_timeout: Option<Duration>,
    /// Close connections older than this
    pub max_lifetime: Option<Duration>,
    /// Run the validation query on every checkout
    pub test_on_borrow: bool,
    /// Query used to validate connections
    pub validation_query: Option<String>,
}

impl Default for PoolTuning {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: None,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            test_on_borrow: false,
            validation_query: Some("SELECT 1".to_string()),
        }
    }
}

impl PoolTuning {
    /// Apply a set of overrides on top of this tuning.
    pub fn apply(&mut self, overrides: &TuningOverrides) {
        if let Some(v) = overrides.max_size {
            self.max_size = v;
        }
        if let Some(v) = overrides.min_idle {
            self.min_idle = Some(v);
        }
        if let Some(v) = overrides.connection_timeout {
            self.connection_timeout = v;
        }
        if let Some(v) = overrides.idle_timeout {
            self.idle_timeout = v;
        }
        if let Some(v) = overrides.max_lifetime {
            self.max_lifetime = v;
        }
        if let Some(v) = overrides.test_on_borrow {
            self.test_on_borrow = v;
        }
        if let Some(v) = &overrides.validation_query {
            self.validation_query = Some(v.clone());
        }
    }

    /// Check the invariants every pool implementation relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size == 0 {
            return Err("max-size must be at least 1".to_string());
        }
        if let Some(min_idle) = self.min_idle {
            if min_idle > self.max_size {
                return Err(format!(
                    "min-idle ({}) must not exceed max-size ({})",
                    min_idle, self.max_size
                ));
            }
        }
        if self.connection_timeout.is_zero() {
            return Err("connection-timeout-ms must be positive".to_string());
        }
        if self.test_on_borrow && self.validation_query.is_none() {
            return Err("test-on-borrow requires a validation-query".to_string());
        }
        Ok(())
    }
}

/// Partial tuning produced by property binding.
///
/// `idle_timeout` and `max_lifetime` are doubly optional: `Some(None)`
/// disables the timeout, `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TuningOverrides {
    pub max_size: Option<u32>,
    pub min_idle: Option<u32>,
    pub connection_timeout: Option<Duration>,
    pub idle_timeout: Option<Option<Duration>>,
    pub max_lifetime: Option<Option<Duration>>,
    pub test_on_borrow: Option<bool>,
    pub validation_query: Option<String>,
}

impl TuningOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
