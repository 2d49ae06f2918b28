//! Session handle
//!
//! Thread-safe façade over a [`SessionFactory`]: each call opens a session,
//! runs one mapped statement and returns the connection.

use super::factory::{SessionError, SessionFactory, SqlSession};
use crate::domain::naming::session_handle_name;
use crate::infrastructure::transaction::TransactionCoordinator;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SessionHandle {
    factory: Arc<SessionFactory>,
}

impl SessionHandle {
    pub fn new(factory: Arc<SessionFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &Arc<SessionFactory> {
        &self.factory
    }

    pub fn resource_name(&self) -> &str {
        self.factory.resource_name()
    }

    /// Registered name (`<resource>SessionHandle`).
    pub fn name(&self) -> String {
        session_handle_name(self.factory.resource_name())
    }

    pub fn select_list(&self, id: &str, params: &Value) -> Result<Vec<Map<String, Value>>, SessionError> {
        self.factory.open_session()?.select_list(id, params)
    }

    pub fn select_one(&self, id: &str, params: &Value) -> Result<Option<Map<String, Value>>, SessionError> {
        self.factory.open_session()?.select_one(id, params)
    }

    pub fn execute(&self, id: &str, params: &Value) -> Result<usize, SessionError> {
        self.factory.open_session()?.execute(id, params)
    }

    /// Run mapped statements inside `coordinator`'s transaction.
    ///
    /// The coordinator must belong to the same data source.
    pub fn in_transaction<T, F>(&self, coordinator: &TransactionCoordinator, work: F) -> Result<T, SessionError>
    where
        F: FnOnce(&SqlSession<'_>) -> Result<T, SessionError>,
    {
        if coordinator.resource_name() != self.factory.resource_name() {
            return Err(SessionError::CoordinatorMismatch {
                factory: self.factory.resource_name().to_string(),
                coordinator: coordinator.resource_name().to_string(),
            });
        }
        coordinator.execute(|conn| work(&self.factory.session_on(conn)))
    }
}
