//! Connection Pool
//!
//! In-crate SQLite connection pool backing the `native` pool kind.
//! Tuning is read on every checkout so late-bound properties take effect
//! without rebuilding the pool.

use crate::domain::error::PoolError;
use crate::domain::ports::{PoolConnection, PoolState, PooledConnectionProvider};
use crate::domain::value_objects::{PoolKind, PoolTuning, TuningOverrides};
use crate::infrastructure::sqlite_url::SqliteTarget;
use parking_lot::{Condvar, Mutex, RwLock};
use rusqlite::Connection;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A connection sitting in (or checked out of) the pool.
struct IdleConnection {
    conn: Connection,
    /// When this connection was created
    created_at: Instant,
    /// When this connection was last used
    last_used: Instant,
}

impl IdleConnection {
    fn open(target: &SqliteTarget) -> rusqlite::Result<Self> {
        let now = Instant::now();
        Ok(Self {
            conn: target.open()?,
            created_at: now,
            last_used: now,
        })
    }

    /// Check if this connection has exceeded its lifetime.
    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|lifetime| self.created_at.elapsed() > lifetime)
    }

    /// Check if this connection has been idle too long.
    fn is_idle_expired(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|timeout| self.last_used.elapsed() > timeout)
    }

    fn touch(&mut self) {
        self.last_used = Instant::now();
    }
}

struct PoolInner {
    idle: VecDeque<IdleConnection>,
    /// Idle + checked out
    total: u32,
}

struct PoolShared {
    name: String,
    target: SqliteTarget,
    tuning: RwLock<PoolTuning>,
    inner: Mutex<PoolInner>,
    available: Condvar,
}

enum Candidate {
    Idle(IdleConnection),
    Open,
}

impl PoolShared {
    fn checkout(self: &Arc<Self>) -> Result<NativeConnection, PoolError> {
        let tuning = self.tuning.read().clone();
        let deadline = Instant::now() + tuning.connection_timeout;

        loop {
            let candidate = {
                let mut inner = self.inner.lock();
                loop {
                    if let Some(conn) = inner.idle.pop_front() {
                        if conn.is_expired(tuning.max_lifetime)
                            || conn.is_idle_expired(tuning.idle_timeout)
                        {
                            tracing::debug!("discarding expired connection to {}", self.name);
                            inner.total -= 1;
                            continue;
                        }
                        break Candidate::Idle(conn);
                    }
                    if inner.total < tuning.max_size {
                        inner.total += 1;
                        break Candidate::Open;
                    }
                    if self.available.wait_until(&mut inner, deadline).timed_out() {
                        return Err(PoolError::Timeout(tuning.connection_timeout));
                    }
                }
            };

            let (mut conn, fresh) = match candidate {
                Candidate::Idle(conn) => (conn, false),
                Candidate::Open => match IdleConnection::open(&self.target) {
                    Ok(conn) => (conn, true),
                    Err(e) => {
                        self.forget_one();
                        return Err(PoolError::Connect(e));
                    }
                },
            };

            if tuning.test_on_borrow {
                if let Some(query) = &tuning.validation_query {
                    if let Err(e) = conn.conn.execute_batch(query) {
                        self.forget_one();
                        if fresh {
                            return Err(PoolError::Validation {
                                query: query.clone(),
                                source: e,
                            });
                        }
                        tracing::warn!("pooled connection to {} failed validation: {}", self.name, e);
                        continue;
                    }
                }
            }

            conn.touch();
            return Ok(NativeConnection {
                conn: Some(conn),
                pool: Arc::clone(self),
            });
        }
    }

    /// Return a connection, or drop it if it expired or the pool shrank.
    fn release(&self, conn: IdleConnection) {
        let reusable = self.rollback_open_transaction(&conn.conn);
        self.return_or_close(conn, reusable);
    }

    /// Roll back a transaction the borrower left open. `false` means the
    /// connection is still inside it and must not be pooled again.
    fn rollback_open_transaction(&self, conn: &Connection) -> bool {
        if conn.is_autocommit() {
            return true;
        }

        tracing::warn!("connection returned to {} inside a transaction, rolling back", self.name);
        if let Err(e) = conn.execute_batch("ROLLBACK") {
            tracing::warn!("rollback on {} failed, closing the connection: {}", self.name, e);
            return false;
        }
        conn.is_autocommit()
    }

    fn return_or_close(&self, mut conn: IdleConnection, reusable: bool) {
        let tuning = self.tuning.read().clone();
        {
            let mut inner = self.inner.lock();
            if !reusable || conn.is_expired(tuning.max_lifetime) || inner.total > tuning.max_size {
                inner.total -= 1;
            } else {
                conn.touch();
                inner.idle.push_back(conn);
            }
        }
        self.available.notify_one();
    }

    /// Account for a connection that was closed instead of returned.
    fn forget_one(&self) {
        self.inner.lock().total -= 1;
        self.available.notify_one();
    }
}

/// A checked-out native connection. Returns to the pool on drop.
pub struct NativeConnection {
    /// Always `Some` until dropped
    conn: Option<IdleConnection>,
    pool: Arc<PoolShared>,
}

impl Deref for NativeConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn.as_ref().expect("connection present until drop").conn
    }
}

impl DerefMut for NativeConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn.as_mut().expect("connection present until drop").conn
    }
}

impl Drop for NativeConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

/// Native SQLite connection pool.
pub struct NativePool {
    shared: Arc<PoolShared>,
}

impl NativePool {
    /// Open a pool and warm it up.
    ///
    /// Opens `min_idle` connections (at least one) so an unreachable
    /// database fails here rather than on first use.
    pub fn open(
        name: impl Into<String>,
        target: SqliteTarget,
        tuning: PoolTuning,
    ) -> Result<Self, PoolError> {
        tuning.validate().map_err(PoolError::InvalidTuning)?;

        let warm = tuning.min_idle.unwrap_or(0).max(1);
        let mut idle = VecDeque::with_capacity(warm as usize);
        for _ in 0..warm {
            idle.push_back(IdleConnection::open(&target)?);
        }

        Ok(Self {
            shared: Arc::new(PoolShared {
                name: name.into(),
                target,
                tuning: RwLock::new(tuning),
                inner: Mutex::new(PoolInner { idle, total: warm }),
                available: Condvar::new(),
            }),
        })
    }

    /// Check out a native connection.
    pub fn acquire(&self) -> Result<NativeConnection, PoolError> {
        self.shared.checkout()
    }

    /// Close idle connections that exceeded their idle timeout or lifetime.
    pub fn evict_expired(&self) -> usize {
        let tuning = self.shared.tuning.read().clone();
        let mut inner = self.shared.inner.lock();
        let before = inner.idle.len();

        inner.idle.retain(|conn| {
            !conn.is_idle_expired(tuning.idle_timeout) && !conn.is_expired(tuning.max_lifetime)
        });

        let removed = before - inner.idle.len();
        inner.total -= removed as u32;
        if removed > 0 {
            tracing::debug!(
                "pool cleanup for {}: removed {} idle connections",
                self.shared.name,
                removed
            );
        }
        removed
    }

    /// Close every idle connection.
    pub fn clear(&self) {
        let mut inner = self.shared.inner.lock();
        let idle = inner.idle.len() as u32;
        inner.idle.clear();
        inner.total -= idle;
    }
}

impl PooledConnectionProvider for NativePool {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn kind(&self) -> PoolKind {
        PoolKind::Native
    }

    fn get(&self) -> Result<PoolConnection, PoolError> {
        self.acquire().map(PoolConnection::new)
    }

    fn state(&self) -> PoolState {
        let inner = self.shared.inner.lock();
        PoolState {
            connections: inner.total,
            idle_connections: inner.idle.len() as u32,
            max_size: self.shared.tuning.read().max_size,
        }
    }

    fn tuning(&self) -> PoolTuning {
        self.shared.tuning.read().clone()
    }

    fn retune(&self, overrides: &TuningOverrides) -> Result<(), PoolError> {
        let mut next = self.tuning();
        next.apply(overrides);
        next.validate().map_err(PoolError::InvalidTuning)?;

        *self.shared.tuning.write() = next;
        // A larger max-size may unblock waiters
        self.shared.available.notify_all();
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn memory_pool(tuning: PoolTuning) -> NativePool {
        NativePool::open("test", SqliteTarget::Memory, tuning).unwrap()
    }

    #[test]
    fn test_open_warms_one_connection() {
        let pool = memory_pool(PoolTuning::default());
        let state = pool.state();
        assert_eq!(state.connections, 1);
        assert_eq!(state.idle_connections, 1);
        assert_eq!(state.max_size, 10);
    }

    #[test]
    fn test_open_warms_min_idle() {
        let pool = memory_pool(PoolTuning {
            min_idle: Some(3),
            ..Default::default()
        });
        assert_eq!(pool.state().idle_connections, 3);
    }

    #[test]
    fn test_open_rejects_invalid_tuning() {
        let result = NativePool::open(
            "test",
            SqliteTarget::Memory,
            PoolTuning {
                max_size: 0,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(PoolError::InvalidTuning(_))));
    }

    #[test]
    fn test_open_unreachable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("db.sqlite");
        let result = NativePool::open(
            "test",
            SqliteTarget::Path(missing.to_string_lossy().into_owned()),
            PoolTuning::default(),
        );
        assert!(matches!(result, Err(PoolError::Connect(_))));
    }

    #[test]
    fn test_release_returns_connection() {
        let pool = memory_pool(PoolTuning::default());

        {
            let conn = pool.acquire().unwrap();
            conn.execute_batch("CREATE TABLE marker (id INTEGER)").unwrap();
            assert_eq!(pool.state().idle_connections, 0);
        }

        // Same in-memory connection comes back, so the table is visible
        let conn = pool.acquire().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM marker", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(pool.state().connections, 1);
    }

    #[test]
    fn test_pool_exhausted_times_out() {
        let pool = memory_pool(PoolTuning {
            max_size: 2,
            connection_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        let _conn1 = pool.acquire().unwrap();
        let _conn2 = pool.acquire().unwrap();

        let result = pool.acquire();
        assert!(matches!(result, Err(PoolError::Timeout(_))));
    }

    #[test]
    fn test_waiter_gets_released_connection() {
        let pool = Arc::new(memory_pool(PoolTuning {
            max_size: 1,
            connection_timeout: Duration::from_secs(5),
            ..Default::default()
        }));

        let conn = pool.acquire().unwrap();
        let waiter = {
            let pool = pool.clone();
            std::thread::spawn(move || pool.acquire().map(|_| ()))
        };

        std::thread::sleep(Duration::from_millis(20));
        drop(conn);

        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn test_expired_connection_is_replaced() {
        let pool = memory_pool(PoolTuning {
            max_lifetime: Some(Duration::from_millis(1)),
            ..Default::default()
        });

        std::thread::sleep(Duration::from_millis(10));
        let conn = pool.acquire().unwrap();
        assert_eq!(pool.state().connections, 1);
        std::thread::sleep(Duration::from_millis(10));
        drop(conn);

        // Expired on return as well
        assert_eq!(pool.state().connections, 0);
    }

    #[test]
    fn test_evict_expired() {
        let pool = memory_pool(PoolTuning {
            min_idle: Some(2),
            idle_timeout: Some(Duration::from_millis(1)),
            ..Default::default()
        });

        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(pool.evict_expired(), 2);
        assert_eq!(pool.state().connections, 0);
    }

    #[test]
    fn test_test_on_borrow_with_bad_query_fails_fresh_connection() {
        let pool = memory_pool(PoolTuning {
            test_on_borrow: true,
            validation_query: Some("SELECT * FROM missing_table".to_string()),
            ..Default::default()
        });
        pool.clear();

        let result = pool.acquire();
        assert!(matches!(result, Err(PoolError::Validation { .. })));
        assert_eq!(pool.state().connections, 0);
    }

    #[test]
    fn test_open_transaction_is_rolled_back_on_release() {
        let pool = memory_pool(PoolTuning::default());

        {
            let conn = pool.acquire().unwrap();
            conn.execute_batch("CREATE TABLE t (id INTEGER); BEGIN; INSERT INTO t VALUES (1);")
                .unwrap();
        }

        let conn = pool.acquire().unwrap();
        assert!(conn.is_autocommit());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_connection_that_cannot_be_reset_is_closed() {
        let pool = memory_pool(PoolTuning::default());

        let mut checked_out = pool.acquire().unwrap();
        let conn = checked_out.conn.take().unwrap();
        drop(checked_out);
        assert_eq!(pool.state().connections, 1);

        pool.shared.return_or_close(conn, false);

        let state = pool.state();
        assert_eq!(state.connections, 0);
        assert_eq!(state.idle_connections, 0);
        // The pool opens a fresh connection in its place
        assert!(pool.acquire().unwrap().is_autocommit());
    }

    #[test]
    fn test_retune_applies_and_validates() {
        let pool = memory_pool(PoolTuning::default());

        pool.retune(&TuningOverrides {
            max_size: Some(4),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(pool.tuning().max_size, 4);
        assert_eq!(pool.state().max_size, 4);

        let result = pool.retune(&TuningOverrides {
            max_size: Some(0),
            ..Default::default()
        });
        assert!(matches!(result, Err(PoolError::InvalidTuning(_))));
        assert_eq!(pool.tuning().max_size, 4);
    }

    #[test]
    fn test_provider_get() {
        let pool = memory_pool(PoolTuning::default());
        assert_eq!(pool.kind(), PoolKind::Native);
        assert_eq!(PooledConnectionProvider::name(&pool), "test");

        let conn = pool.get().unwrap();
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }
}
