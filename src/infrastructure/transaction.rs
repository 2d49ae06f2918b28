//! Transaction coordination
//!
//! One [`TransactionCoordinator`] per pool runs units of work atomically on
//! a connection checked out of that pool. Process-wide
//! [`TransactionSettings`] apply to every coordinator.

use crate::domain::error::PoolError;
use crate::domain::naming::coordinator_name;
use crate::domain::ports::{PoolConnection, SharedPool};
use rusqlite::{Connection, TransactionBehavior};
use std::ops::Deref;

/// How SQLite takes locks when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxBehavior {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl TxBehavior {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "deferred" => Some(Self::Deferred),
            "immediate" => Some(Self::Immediate),
            "exclusive" => Some(Self::Exclusive),
            _ => None,
        }
    }

    fn begin_sql(&self) -> &'static str {
        match self {
            Self::Deferred => "BEGIN DEFERRED",
            Self::Immediate => "BEGIN IMMEDIATE",
            Self::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

impl From<TxBehavior> for TransactionBehavior {
    fn from(behavior: TxBehavior) -> Self {
        match behavior {
            TxBehavior::Deferred => TransactionBehavior::Deferred,
            TxBehavior::Immediate => TransactionBehavior::Immediate,
            TxBehavior::Exclusive => TransactionBehavior::Exclusive,
        }
    }
}

impl std::fmt::Display for TxBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deferred => "deferred",
            Self::Immediate => "immediate",
            Self::Exclusive => "exclusive",
        };
        write!(f, "{}", s)
    }
}

/// Settings shared by every coordinator in the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionSettings {
    pub behavior: TxBehavior,
}

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("failed to acquire a connection from `{resource}`: {source}")]
    Acquire {
        resource: String,
        #[source]
        source: PoolError,
    },

    #[error("transaction on `{resource}` failed: {source}")]
    Sqlite {
        resource: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// Runs units of work atomically against one pool.
pub struct TransactionCoordinator {
    resource: String,
    pool: SharedPool,
    settings: TransactionSettings,
}

impl TransactionCoordinator {
    pub fn new(resource: impl Into<String>, pool: SharedPool, settings: TransactionSettings) -> Self {
        Self {
            resource: resource.into(),
            pool,
            settings,
        }
    }

    /// Data source this coordinator is bound to.
    pub fn resource_name(&self) -> &str {
        &self.resource
    }

    /// Registered name (`<resource>TransactionCoordinator`).
    pub fn name(&self) -> String {
        coordinator_name(&self.resource)
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    pub fn behavior(&self) -> TxBehavior {
        self.settings.behavior
    }

    fn acquire(&self) -> Result<PoolConnection, TransactionError> {
        self.pool.get().map_err(|source| TransactionError::Acquire {
            resource: self.resource.clone(),
            source,
        })
    }

    fn sqlite_error(&self, source: rusqlite::Error) -> TransactionError {
        TransactionError::Sqlite {
            resource: self.resource.clone(),
            source,
        }
    }

    /// Run `work` in a transaction: commit on `Ok`, roll back on `Err`.
    pub fn execute<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<TransactionError>,
    {
        let mut conn = self.acquire()?;
        let tx = conn
            .transaction_with_behavior(self.settings.behavior.into())
            .map_err(|e| self.sqlite_error(e))?;

        match work(&*tx) {
            Ok(value) => {
                tx.commit().map_err(|e| self.sqlite_error(e))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = tx.rollback() {
                    tracing::warn!("rollback on `{}` failed: {}", self.resource, e);
                }
                Err(err)
            }
        }
    }

    /// Begin a transaction the caller finishes explicitly.
    pub fn begin(&self) -> Result<ScopedTransaction, TransactionError> {
        let conn = self.acquire()?;
        conn.execute_batch(self.settings.behavior.begin_sql())
            .map_err(|e| self.sqlite_error(e))?;

        Ok(ScopedTransaction {
            resource: self.resource.clone(),
            conn,
            finished: false,
        })
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("resource", &self.resource)
            .field("behavior", &self.settings.behavior)
            .finish()
    }
}

/// An open transaction. Rolls back on drop unless committed.
pub struct ScopedTransaction {
    resource: String,
    conn: PoolConnection,
    finished: bool,
}

impl ScopedTransaction {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn finish(&mut self, sql: &str) -> Result<(), TransactionError> {
        self.conn
            .execute_batch(sql)
            .map_err(|source| TransactionError::Sqlite {
                resource: self.resource.clone(),
                source,
            })?;
        self.finished = true;
        Ok(())
    }

    pub fn commit(mut self) -> Result<(), TransactionError> {
        self.finish("COMMIT")
    }

    pub fn rollback(mut self) -> Result<(), TransactionError> {
        self.finish("ROLLBACK")
    }
}

impl Deref for ScopedTransaction {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for ScopedTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("implicit rollback on `{}` failed: {}", self.resource, e);
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::value_objects::PoolTuning;
    use crate::infrastructure::connection_pool::NativePool;
    use crate::infrastructure::sqlite_url::SqliteTarget;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    #[allow(dead_code)]
    enum WorkError {
        Tx(TransactionError),
        Sql(rusqlite::Error),
        Abort,
    }

    impl From<TransactionError> for WorkError {
        fn from(e: TransactionError) -> Self {
            WorkError::Tx(e)
        }
    }

    impl From<rusqlite::Error> for WorkError {
        fn from(e: rusqlite::Error) -> Self {
            WorkError::Sql(e)
        }
    }

    fn coordinator(dir: &tempfile::TempDir, tuning: PoolTuning) -> TransactionCoordinator {
        let path = dir.path().join("tx.db");
        let pool = NativePool::open(
            "orders",
            SqliteTarget::Path(path.to_string_lossy().into_owned()),
            tuning,
        )
        .unwrap();
        pool.acquire()
            .unwrap()
            .execute_batch("CREATE TABLE orders (id INTEGER PRIMARY KEY, total INTEGER)")
            .unwrap();
        TransactionCoordinator::new("orders", Arc::new(pool), TransactionSettings::default())
    }

    fn count(coordinator: &TransactionCoordinator) -> i64 {
        coordinator
            .pool()
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_tx_behavior_from_tag() {
        assert_eq!(TxBehavior::from_tag("IMMEDIATE"), Some(TxBehavior::Immediate));
        assert_eq!(TxBehavior::from_tag("exclusive"), Some(TxBehavior::Exclusive));
        assert_eq!(TxBehavior::from_tag("serializable"), None);
        assert_eq!(TxBehavior::default(), TxBehavior::Deferred);
    }

    #[test]
    fn test_names() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&dir, PoolTuning::default());
        assert_eq!(coordinator.resource_name(), "orders");
        assert_eq!(coordinator.name(), "ordersTransactionCoordinator");
        assert_eq!(coordinator.behavior(), TxBehavior::Deferred);
    }

    #[test]
    fn test_execute_commits_on_ok() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&dir, PoolTuning::default());

        let inserted: Result<usize, WorkError> = coordinator.execute(|conn| {
            Ok(conn.execute("INSERT INTO orders (id, total) VALUES (1, 10)", [])?)
        });
        assert_eq!(inserted.unwrap(), 1);
        assert_eq!(count(&coordinator), 1);
    }

    #[test]
    fn test_execute_rolls_back_on_err() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&dir, PoolTuning::default());

        let result: Result<(), WorkError> = coordinator.execute(|conn| {
            conn.execute("INSERT INTO orders (id, total) VALUES (1, 10)", [])?;
            Err(WorkError::Abort)
        });
        assert!(matches!(result, Err(WorkError::Abort)));
        assert_eq!(count(&coordinator), 0);
    }

    #[test]
    fn test_execute_reports_acquire_failure() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(
            &dir,
            PoolTuning {
                max_size: 1,
                connection_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        );

        let _held = coordinator.pool().get().unwrap();
        let result: Result<(), TransactionError> = coordinator.execute(|_| Ok(()));
        assert!(matches!(result, Err(TransactionError::Acquire { .. })));
    }

    #[test]
    fn test_scoped_commit() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&dir, PoolTuning::default());

        let tx = coordinator.begin().unwrap();
        tx.execute("INSERT INTO orders (id, total) VALUES (1, 10)", [])
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(count(&coordinator), 1);
    }

    #[test]
    fn test_scoped_drop_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(&dir, PoolTuning::default());

        {
            let tx = coordinator.begin().unwrap();
            tx.connection()
                .execute("INSERT INTO orders (id, total) VALUES (1, 10)", [])
                .unwrap();
        }

        assert_eq!(count(&coordinator), 0);
    }

    #[test]
    fn test_immediate_behavior() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tx.db");
        let pool = NativePool::open(
            "orders",
            SqliteTarget::Path(path.to_string_lossy().into_owned()),
            PoolTuning::default(),
        )
        .unwrap();
        let coordinator = TransactionCoordinator::new(
            "orders",
            Arc::new(pool),
            TransactionSettings {
                behavior: TxBehavior::Immediate,
            },
        );

        let tx = coordinator.begin().unwrap();
        assert!(!tx.is_autocommit());
        tx.rollback().unwrap();
    }
}
