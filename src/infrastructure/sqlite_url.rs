//! SQLite connection targets
//!
//! Parses the `url` of a data source into something both pool
//! implementations can open.

use crate::domain::error::PoolError;
use rusqlite::Connection;

/// Where a pool opens its connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    /// Private in-memory database per connection
    Memory,
    /// Filesystem path or `file:` URI
    Path(String),
}

impl SqliteTarget {
    /// Parse a connection URL.
    ///
    /// Accepts `:memory:`, `sqlite::memory:`, `sqlite://path`, `sqlite:path`,
    /// `file:` URIs and plain paths.
    pub fn parse(url: &str) -> Result<Self, PoolError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(PoolError::InvalidUrl {
                url: url.to_string(),
                reason: "connection url is empty".to_string(),
            });
        }

        let stripped = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);

        match stripped {
            "" => Err(PoolError::InvalidUrl {
                url: url.to_string(),
                reason: "no database path after scheme".to_string(),
            }),
            ":memory:" => Ok(Self::Memory),
            path => Ok(Self::Path(path.to_string())),
        }
    }

    /// Open a new connection. Default open flags accept `file:` URIs.
    pub fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            Self::Memory => Connection::open_in_memory(),
            Self::Path(path) => Connection::open(path),
        }
    }
}

impl std::fmt::Display for SqliteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, ":memory:"),
            Self::Path(path) => write!(f, "{}", path),
        }
    }
}
