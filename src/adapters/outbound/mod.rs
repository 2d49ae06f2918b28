mod map_property_source;
mod native_pool_builder;
#[cfg(feature = "r2d2")]
mod r2d2_pool_builder;

pub use map_property_source::MapPropertySource;
pub use native_pool_builder::NativePoolBuilder;
#[cfg(feature = "r2d2")]
pub use r2d2_pool_builder::{R2d2Pool, R2d2PoolBuilder};
