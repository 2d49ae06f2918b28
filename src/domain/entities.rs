//! Domain Entities - Core business objects
//!
//! A [`ResourceSpec`] is one named data-source request read from
//! configuration. Everything the registry holds is derived from it.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Connection parameters of a data source.
#[derive(Clone, Default, Deserialize)]
pub struct ConnectionParams {
    /// SQLite path, `file:` URI, `sqlite:`-prefixed path or `:memory:`
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One named data-source request.
///
/// `kind` is kept as the raw tag: unknown tags are only rejected when a
/// builder is resolved, never at load time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceSpec {
    /// Unique data-source name
    #[serde(default)]
    pub name: String,
    /// Pool implementation tag (`r2d2`, `native`); probed when absent
    #[serde(default)]
    pub kind: Option<String>,
    /// Connection parameters
    #[serde(flatten)]
    pub connection: ConnectionParams,
    /// Build-time pool tuning (`pool` section)
    #[serde(default, rename = "pool")]
    pub tuning: BTreeMap<String, serde_json::Value>,
}

impl ResourceSpec {
    /// Create a spec with a name and connection URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection: ConnectionParams {
                url: url.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Set the pool kind tag.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.connection.username = Some(username.into());
        self.connection.password = Some(password.into());
        self
    }

    /// Add a build-time tuning entry.
    pub fn tuning(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.tuning.insert(key.into(), value.into());
        self
    }

    /// Short description used in error messages.
    pub fn describe(&self, index: usize) -> String {
        format!(
            "data-sources[{}] (name=`{}`, kind={}, url={})",
            index,
            self.name,
            self.kind.as_deref().unwrap_or("<probe>"),
            self.connection.url
        )
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spec_builder() {
        let spec = ResourceSpec::new("orders", "orders.db")
            .kind("native")
            .credentials("app", "secret")
            .tuning("max-size", 4);

        assert_eq!(spec.name, "orders");
        assert_eq!(spec.kind.as_deref(), Some("native"));
        assert_eq!(spec.connection.url, "orders.db");
        assert_eq!(spec.connection.username.as_deref(), Some("app"));
        assert_eq!(spec.tuning.get("max-size"), Some(&json!(4)));
    }

    #[test]
    fn test_spec_deserialize_full_entry() {
        let spec: ResourceSpec = serde_json::from_value(json!({
            "name": "orders",
            "kind": "r2d2",
            "url": "file:orders.db",
            "username": "app",
            "password": "secret",
            "pool": { "max-size": 8 },
            "r2d2": { "connection-timeout-ms": 500 }
        }))
        .unwrap();

        assert_eq!(spec.name, "orders");
        assert_eq!(spec.kind.as_deref(), Some("r2d2"));
        assert_eq!(spec.connection.url, "file:orders.db");
        assert_eq!(spec.connection.password.as_deref(), Some("secret"));
        assert_eq!(spec.tuning.get("max-size"), Some(&json!(8)));
        assert!(!spec.tuning.contains_key("connection-timeout-ms"));
    }

    #[test]
    fn test_spec_deserialize_minimal_entry() {
        let spec: ResourceSpec = serde_json::from_value(json!({ "name": "users" })).unwrap();
        assert_eq!(spec.name, "users");
        assert!(spec.kind.is_none());
        assert!(spec.connection.url.is_empty());
        assert!(spec.tuning.is_empty());
    }

    #[test]
    fn test_connection_params_debug_redacts_password() {
        let spec = ResourceSpec::new("orders", "orders.db").credentials("app", "hunter2");
        let debug_str = format!("{:?}", spec);
        assert!(debug_str.contains("<redacted>"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_describe() {
        let spec = ResourceSpec::new("orders", "orders.db");
        assert_eq!(
            spec.describe(2),
            "data-sources[2] (name=`orders`, kind=<probe>, url=orders.db)"
        );
    }
}
