//! Pooled Connection Provider Port
//!
//! Defines the interface every pool implementation exposes to the
//! registry, the transaction coordinator and the session factory.

use crate::domain::error::PoolError;
use crate::domain::value_objects::{PoolKind, PoolTuning, TuningOverrides};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Shared handle to a pool held by the registry.
pub type SharedPool = Arc<dyn PooledConnectionProvider>;

/// A live connection pool bound to one data source.
///
/// Implementations must be safe to share between threads; the registry
/// hands the same instance to every consumer.
pub trait PooledConnectionProvider: Send + Sync {
    /// Data-source name this pool was built for.
    fn name(&self) -> &str;

    /// Implementation that produced this pool.
    fn kind(&self) -> PoolKind;

    /// Check out a connection. It returns to the pool when dropped.
    fn get(&self) -> Result<PoolConnection, PoolError>;

    /// Current connection counts.
    fn state(&self) -> PoolState;

    /// Effective tuning.
    fn tuning(&self) -> PoolTuning;

    /// Apply late-bound tuning.
    ///
    /// Implementations apply what they can change at runtime and log the
    /// rest.
    fn retune(&self, overrides: &TuningOverrides) -> Result<(), PoolError>;
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// Open connections (idle + checked out)
    pub connections: u32,
    /// Idle connections
    pub idle_connections: u32,
    /// Configured maximum
    pub max_size: u32,
}

/// A checked-out connection, whatever pool it came from.
pub struct PoolConnection {
    inner: Box<dyn DerefMut<Target = Connection> + Send>,
}

impl PoolConnection {
    pub fn new<C>(conn: C) -> Self
    where
        C: DerefMut<Target = Connection> + Send + 'static,
    {
        Self {
            inner: Box::new(conn),
        }
    }
}

impl Deref for PoolConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.inner
    }
}

impl DerefMut for PoolConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.inner
    }
}

impl std::fmt::Debug for PoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnection").finish_non_exhaustive()
    }
}
