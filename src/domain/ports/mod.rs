mod connection_provider;
mod pool_builder;
mod property_source;

pub use connection_provider::{PoolConnection, PoolState, PooledConnectionProvider, SharedPool};
pub use pool_builder::PoolBuilder;
pub use property_source::PropertySource;
