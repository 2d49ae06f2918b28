//! Native Pool Builder
//!
//! Implements PoolBuilder with the in-crate connection pool.

use crate::domain::entities::ResourceSpec;
use crate::domain::error::{cause, Cause};
use crate::domain::ports::{PoolBuilder, SharedPool};
use crate::domain::value_objects::PoolKind;
use crate::infrastructure::connection_pool::NativePool;
use crate::infrastructure::property_binder::build_time_tuning;
use crate::infrastructure::sqlite_url::SqliteTarget;
use std::sync::Arc;

/// Builds [`NativePool`]s. Always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePoolBuilder;

impl PoolBuilder for NativePoolBuilder {
    fn kind(&self) -> PoolKind {
        PoolKind::Native
    }

    fn build(&self, spec: &ResourceSpec) -> Result<SharedPool, Cause> {
        let target = SqliteTarget::parse(&spec.connection.url).map_err(cause)?;
        let tuning = build_time_tuning(spec).map_err(cause)?;

        tracing::debug!(
            "opening native pool `{}` on {} (max-size={})",
            spec.name,
            target,
            tuning.max_size
        );
        let pool = NativePool::open(spec.name.clone(), target, tuning).map_err(cause)?;
        Ok(Arc::new(pool))
    }
}
