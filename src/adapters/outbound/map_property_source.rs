//! Map Property Source
//!
//! Implements PropertySource over a flattened JSON configuration tree plus
//! explicit overrides.

use crate::domain::ports::PropertySource;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// In-memory property source.
///
/// Nested objects flatten to dotted keys and arrays to `[i]` suffixes, so
/// `{"a": {"b": [{"c": 1}]}}` yields `a.b[0].c = 1`. Nulls are skipped.
pub struct MapPropertySource {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MapPropertySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Flatten a JSON tree into a new source.
    pub fn from_json(tree: &Value) -> Self {
        let mut entries = BTreeMap::new();
        flatten(tree, String::new(), &mut entries);
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Set (or override) a single property.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MapPropertySource {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten(value: &Value, path: String, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten(child, child_path, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten(child, format!("{}[{}]", path, i), out);
            }
        }
        Value::String(s) => {
            out.insert(path, s.clone());
        }
        scalar => {
            out.insert(path, scalar.to_string());
        }
    }
}

impl PropertySource for MapPropertySource {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn entries_under(&self, prefix: &str) -> Vec<(String, String)> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let dotted = format!("{}.", prefix);
        self.entries
            .read()
            .range(dotted.clone()..)
            .take_while(|(key, _)| key.starts_with(&dotted))
            .map(|(key, value)| (key[dotted.len()..].to_string(), value.clone()))
            .collect()
    }
}
