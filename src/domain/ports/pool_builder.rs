//! Pool Builder Port
//!
//! Strategy that turns a data-source spec into a live pool.

use crate::domain::entities::ResourceSpec;
use crate::domain::error::Cause;
use crate::domain::ports::SharedPool;
use crate::domain::value_objects::PoolKind;

/// Builds pools of one [`PoolKind`].
///
/// Builders are registered in a `BuilderRegistry` and selected either by the
/// spec's explicit kind or by probing the fixed kind order.
pub trait PoolBuilder: Send + Sync {
    /// Kind of pool this builder produces.
    fn kind(&self) -> PoolKind;

    /// Build a pool for `spec`. Failures are wrapped with the resource name
    /// by the caller.
    fn build(&self, spec: &ResourceSpec) -> Result<SharedPool, Cause>;
}
