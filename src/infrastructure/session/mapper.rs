//! Mapper documents
//!
//! A mapper file is a JSON document holding named SQL statements:
//!
//! ```json
//! { "namespace": "orders",
//!   "statements": [ { "id": "findById", "sql": "SELECT * FROM orders WHERE id = :id" } ] }
//! ```
//!
//! Statements are addressed as `<namespace>.<id>`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct MapperDocument {
    pub namespace: String,
    #[serde(default)]
    pub statements: Vec<StatementDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementDef {
    pub id: String,
    pub sql: String,
}

/// A statement ready to run, with its fully qualified id.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedStatement {
    pub id: String,
    pub sql: String,
    /// Mapper file it came from
    pub source: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    #[error("invalid mapper pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("cannot read mapper {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mapper {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("mapper {} has an empty namespace", .path.display())]
    EmptyNamespace { path: PathBuf },

    #[error("mapper {} has a statement `{id}` with an empty id or sql", .path.display())]
    EmptyStatement { path: PathBuf, id: String },

    #[error("statement `{id}` defined in both {} and {}", .first.display(), .second.display())]
    DuplicateStatement {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Every statement loaded for one data source.
#[derive(Debug, Clone, Default)]
pub struct MappedStatements {
    statements: BTreeMap<String, MappedStatement>,
    mapper_count: usize,
}

impl MappedStatements {
    pub fn get(&self, id: &str) -> Option<&MappedStatement> {
        self.statements.get(id)
    }

    /// Qualified ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        self.statements.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Number of mapper files loaded.
    pub fn mapper_count(&self) -> usize {
        self.mapper_count
    }

    fn insert(&mut self, statement: MappedStatement) -> Result<(), MapperError> {
        if let Some(existing) = self.statements.get(&statement.id) {
            return Err(MapperError::DuplicateStatement {
                id: statement.id,
                first: existing.source.clone(),
                second: statement.source,
            });
        }
        self.statements.insert(statement.id.clone(), statement);
        Ok(())
    }
}

/// Files matching `pattern`, sorted. Directories are skipped; no match is
/// an empty list.
pub fn resolve_mapper_files(pattern: &str) -> Result<Vec<PathBuf>, MapperError> {
    let entries = glob::glob(pattern).map_err(|e| MapperError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| MapperError::Unreadable {
            path: e.path().to_path_buf(),
            source: std::io::Error::from(e),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_document(path: &Path) -> Result<MapperDocument, MapperError> {
    let raw = std::fs::read_to_string(path).map_err(|source| MapperError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| MapperError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse every mapper file into one statement set.
pub fn load_mappers(files: &[PathBuf]) -> Result<MappedStatements, MapperError> {
    let mut loaded = MappedStatements::default();

    for path in files {
        let doc = load_document(path)?;
        let namespace = doc.namespace.trim();
        if namespace.is_empty() {
            return Err(MapperError::EmptyNamespace { path: path.clone() });
        }

        for def in doc.statements {
            if def.id.trim().is_empty() || def.sql.trim().is_empty() {
                return Err(MapperError::EmptyStatement {
                    path: path.clone(),
                    id: def.id,
                });
            }
            loaded.insert(MappedStatement {
                id: format!("{}.{}", namespace, def.id.trim()),
                sql: def.sql,
                source: path.clone(),
            })?;
        }
        loaded.mapper_count += 1;
    }

    Ok(loaded)
}
