//! r2d2 Pool Builder
//!
//! Implements PoolBuilder with `r2d2` over `r2d2_sqlite`.

use crate::domain::entities::ResourceSpec;
use crate::domain::error::{cause, Cause, PoolError};
use crate::domain::ports::{
    PoolBuilder, PoolConnection, PoolState, PooledConnectionProvider, SharedPool,
};
use crate::domain::value_objects::{PoolKind, PoolTuning, TuningOverrides};
use crate::infrastructure::property_binder::build_time_tuning;
use crate::infrastructure::sqlite_url::SqliteTarget;
use parking_lot::RwLock;
use r2d2_sqlite::SqliteConnectionManager;
use std::sync::Arc;

/// Builds r2d2-backed pools. Probed before the native pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct R2d2PoolBuilder;

impl PoolBuilder for R2d2PoolBuilder {
    fn kind(&self) -> PoolKind {
        PoolKind::R2d2
    }

    fn build(&self, spec: &ResourceSpec) -> Result<SharedPool, Cause> {
        let target = SqliteTarget::parse(&spec.connection.url).map_err(cause)?;
        // r2d2's builder asserts on out-of-range values; validated here first
        let tuning = build_time_tuning(spec).map_err(cause)?;

        let manager = match &target {
            SqliteTarget::Memory => SqliteConnectionManager::memory(),
            SqliteTarget::Path(path) => SqliteConnectionManager::file(path),
        };

        tracing::debug!(
            "opening r2d2 pool `{}` on {} (max-size={})",
            spec.name,
            target,
            tuning.max_size
        );
        let pool = r2d2::Pool::builder()
            .max_size(tuning.max_size)
            .min_idle(tuning.min_idle)
            .connection_timeout(tuning.connection_timeout)
            .idle_timeout(tuning.idle_timeout)
            .max_lifetime(tuning.max_lifetime)
            .test_on_check_out(false)
            .build(manager)
            .map_err(cause)?;

        Ok(Arc::new(R2d2Pool {
            name: spec.name.clone(),
            pool,
            tuning: RwLock::new(tuning),
        }))
    }
}

/// An r2d2 pool seen through [`PooledConnectionProvider`].
pub struct R2d2Pool {
    name: String,
    pool: r2d2::Pool<SqliteConnectionManager>,
    tuning: RwLock<PoolTuning>,
}

impl PooledConnectionProvider for R2d2Pool {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PoolKind {
        PoolKind::R2d2
    }

    fn get(&self) -> Result<PoolConnection, PoolError> {
        let tuning = self.tuning.read().clone();
        let conn = self
            .pool
            .get_timeout(tuning.connection_timeout)
            .map_err(|e| PoolError::Backend(e.to_string()))?;

        if tuning.test_on_borrow {
            if let Some(query) = &tuning.validation_query {
                conn.execute_batch(query)
                    .map_err(|source| PoolError::Validation {
                        query: query.clone(),
                        source,
                    })?;
            }
        }

        Ok(PoolConnection::new(conn))
    }

    fn state(&self) -> PoolState {
        let state = self.pool.state();
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
            max_size: self.pool.max_size(),
        }
    }

    fn tuning(&self) -> PoolTuning {
        self.tuning.read().clone()
    }

    /// Checkout timeout and validation apply immediately; sizing and
    /// connection lifetimes are fixed when r2d2 builds the pool.
    fn retune(&self, overrides: &TuningOverrides) -> Result<(), PoolError> {
        let fixed = [
            ("max-size", overrides.max_size.is_some()),
            ("min-idle", overrides.min_idle.is_some()),
            ("idle-timeout-secs", overrides.idle_timeout.is_some()),
            ("max-lifetime-secs", overrides.max_lifetime.is_some()),
        ];
        for (key, present) in fixed {
            if present {
                tracing::warn!(
                    "r2d2 pool `{}` cannot change `{}` after build, ignoring",
                    self.name,
                    key
                );
            }
        }

        let mut next = self.tuning();
        next.apply(&TuningOverrides {
            connection_timeout: overrides.connection_timeout,
            test_on_borrow: overrides.test_on_borrow,
            validation_query: overrides.validation_query.clone(),
            ..Default::default()
        });
        next.validate().map_err(PoolError::InvalidTuning)?;

        *self.tuning.write() = next;
        Ok(())
    }
}
