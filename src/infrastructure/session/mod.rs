//! Mapped-statement sessions
//!
//! Mapper loading, the per-pool session factory and the session handle
//! consumers resolve by name.

pub mod factory;
pub mod handle;
pub mod mapper;

pub use factory::{ExecutorKind, SessionError, SessionFactory, SqlSession};
pub use handle::SessionHandle;
pub use mapper::{load_mappers, resolve_mapper_files, MappedStatement, MappedStatements, MapperError};
