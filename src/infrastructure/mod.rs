//! Infrastructure Layer
//!
//! SQLite pooling, property binding, transactions and mapped-statement
//! sessions.

pub mod connection_pool;
pub mod property_binder;
pub mod session;
pub mod shutdown;
pub mod sqlite_url;
pub mod transaction;

pub use connection_pool::{NativeConnection, NativePool};
pub use property_binder::{bind_from_source, build_time_tuning, BindError};
pub use session::{ExecutorKind, SessionError, SessionFactory, SessionHandle, SqlSession};
pub use shutdown::shutdown_signal;
pub use sqlite_url::SqliteTarget;
pub use transaction::{
    ScopedTransaction, TransactionCoordinator, TransactionError, TransactionSettings, TxBehavior,
};
