//! Session factory and SQL sessions
//!
//! A [`SessionFactory`] binds one pool to the mapped statements loaded for
//! its data source. Sessions run those statements with named JSON
//! parameters and return rows as JSON objects.

use super::mapper::{MappedStatement, MappedStatements};
use crate::domain::error::PoolError;
use crate::domain::naming::session_factory_name;
use crate::domain::ports::{PoolConnection, SharedPool};
use crate::infrastructure::transaction::TransactionError;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{CachedStatement, Connection, Row, Statement};
use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};

/// How sessions prepare statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorKind {
    /// Prepare on every call
    #[default]
    Simple,
    /// Reuse prepared statements through the connection's cache
    Reuse,
}

impl ExecutorKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "simple" => Some(Self::Simple),
            "reuse" => Some(Self::Reuse),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to acquire a connection from `{resource}`: {source}")]
    Acquire {
        resource: String,
        #[source]
        source: PoolError,
    },

    #[error("unknown mapped statement `{0}`")]
    UnknownStatement(String),

    #[error("statement `{id}` failed: {source}")]
    Sqlite {
        id: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("statement `{id}` has no value for parameter `{param}`")]
    UnboundParameter { id: String, param: String },

    #[error("statement `{id}` returned {rows} rows, expected at most one")]
    TooManyRows { id: String, rows: usize },

    #[error("parameters for `{id}` must be a JSON object or null")]
    InvalidParameters { id: String },

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("session factory for `{factory}` cannot join a transaction on `{coordinator}`")]
    CoordinatorMismatch { factory: String, coordinator: String },
}

/// Entry point for mapped statements against one pool.
pub struct SessionFactory {
    resource: String,
    pool: SharedPool,
    statements: MappedStatements,
    executor: ExecutorKind,
}

impl SessionFactory {
    pub fn new(
        resource: impl Into<String>,
        pool: SharedPool,
        statements: MappedStatements,
        executor: ExecutorKind,
    ) -> Self {
        Self {
            resource: resource.into(),
            pool,
            statements,
            executor,
        }
    }

    /// Check the pool is reachable by checking out one connection.
    pub fn verify(&self) -> Result<(), SessionError> {
        self.acquire().map(|_| ())
    }

    fn acquire(&self) -> Result<PoolConnection, SessionError> {
        self.pool.get().map_err(|source| SessionError::Acquire {
            resource: self.resource.clone(),
            source,
        })
    }

    /// Open a session on its own pooled connection.
    pub fn open_session(&self) -> Result<SqlSession<'_>, SessionError> {
        Ok(SqlSession {
            factory: self,
            conn: SessionConnection::Owned(self.acquire()?),
        })
    }

    /// Open a session on a connection the caller already holds, such as
    /// one inside a coordinator's transaction.
    pub fn session_on<'a>(&'a self, conn: &'a Connection) -> SqlSession<'a> {
        SqlSession {
            factory: self,
            conn: SessionConnection::Borrowed(conn),
        }
    }

    pub fn resource_name(&self) -> &str {
        &self.resource
    }

    /// Registered name (`<resource>SessionFactory`).
    pub fn name(&self) -> String {
        session_factory_name(&self.resource)
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    pub fn executor(&self) -> ExecutorKind {
        self.executor
    }

    pub fn statement_ids(&self) -> Vec<&str> {
        self.statements.ids()
    }

    pub fn mapper_count(&self) -> usize {
        self.statements.mapper_count()
    }

    fn statement(&self, id: &str) -> Result<&MappedStatement, SessionError> {
        self.statements
            .get(id)
            .ok_or_else(|| SessionError::UnknownStatement(id.to_string()))
    }
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("resource", &self.resource)
            .field("statements", &self.statements.len())
            .field("executor", &self.executor)
            .finish()
    }
}

enum SessionConnection<'a> {
    Owned(PoolConnection),
    Borrowed(&'a Connection),
}

impl Deref for SessionConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::Owned(conn) => conn,
            Self::Borrowed(conn) => conn,
        }
    }
}

enum Prepared<'c> {
    Simple(Statement<'c>),
    Reuse(CachedStatement<'c>),
}

impl<'c> Deref for Prepared<'c> {
    type Target = Statement<'c>;

    fn deref(&self) -> &Statement<'c> {
        match self {
            Self::Simple(stmt) => stmt,
            Self::Reuse(stmt) => stmt,
        }
    }
}

impl<'c> DerefMut for Prepared<'c> {
    fn deref_mut(&mut self) -> &mut Statement<'c> {
        match self {
            Self::Simple(stmt) => stmt,
            Self::Reuse(stmt) => stmt,
        }
    }
}

/// A unit of mapped-statement work on one connection.
pub struct SqlSession<'a> {
    factory: &'a SessionFactory,
    conn: SessionConnection<'a>,
}

impl SqlSession<'_> {
    /// Run a query and return every row.
    pub fn select_list(&self, id: &str, params: &Value) -> Result<Vec<Map<String, Value>>, SessionError> {
        let mut stmt = self.prepare(id, params)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| sqlite_error(id, e))? {
            out.push(row_to_json(row, &columns).map_err(|e| sqlite_error(id, e))?);
        }
        Ok(out)
    }

    /// Run a query expected to return zero or one row.
    pub fn select_one(&self, id: &str, params: &Value) -> Result<Option<Map<String, Value>>, SessionError> {
        let mut rows = self.select_list(id, params)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(SessionError::TooManyRows {
                id: id.to_string(),
                rows: n,
            }),
        }
    }

    /// Run an insert/update/delete and return the affected row count.
    pub fn execute(&self, id: &str, params: &Value) -> Result<usize, SessionError> {
        let mut stmt = self.prepare(id, params)?;
        stmt.raw_execute().map_err(|e| sqlite_error(id, e))
    }

    fn prepare(&self, id: &str, params: &Value) -> Result<Prepared<'_>, SessionError> {
        let mapped = self.factory.statement(id)?;
        let mut stmt = match self.factory.executor {
            ExecutorKind::Simple => self.conn.prepare(&mapped.sql).map(Prepared::Simple),
            ExecutorKind::Reuse => self.conn.prepare_cached(&mapped.sql).map(Prepared::Reuse),
        }
        .map_err(|e| sqlite_error(id, e))?;

        bind_parameters(&mut stmt, id, params)?;
        Ok(stmt)
    }
}

fn sqlite_error(id: &str, source: rusqlite::Error) -> SessionError {
    SessionError::Sqlite {
        id: id.to_string(),
        source,
    }
}

/// Bind `:name`, `@name` and `$name` parameters from a JSON object.
fn bind_parameters(stmt: &mut Statement<'_>, id: &str, params: &Value) -> Result<(), SessionError> {
    let values = match params {
        Value::Null => None,
        Value::Object(map) => Some(map),
        _ => return Err(SessionError::InvalidParameters { id: id.to_string() }),
    };

    for index in 1..=stmt.parameter_count() {
        let param = match stmt.parameter_name(index) {
            Some(name) => name.to_string(),
            None => format!("?{}", index),
        };
        let key = param.trim_start_matches(|c| matches!(c, ':' | '@' | '$'));
        let value = values
            .and_then(|map| map.get(key))
            .ok_or_else(|| SessionError::UnboundParameter {
                id: id.to_string(),
                param: param.clone(),
            })?;

        stmt.raw_bind_parameter(index, json_to_sql(value))
            .map_err(|e| sqlite_error(id, e))?;
    }
    Ok(())
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn row_to_json(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Map<String, Value>> {
    let mut map = Map::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(n) => Value::from(n),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::from(bytes.to_vec()),
        };
        map.insert(column.clone(), value);
    }
    Ok(map)
}
