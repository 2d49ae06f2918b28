//! Resource naming conventions
//!
//! Every derived resource is registered under `<data-source-name><Suffix>`;
//! external configuration keys depend on the property prefix format.

use crate::domain::value_objects::{PoolKind, ResourceKind};
use std::path::Path;

pub const TRANSACTION_COORDINATOR_SUFFIX: &str = "TransactionCoordinator";
pub const SESSION_FACTORY_SUFFIX: &str = "SessionFactory";
pub const SESSION_HANDLE_SUFFIX: &str = "SessionHandle";

/// Base of every tuning property prefix.
pub const DEFAULT_PROPERTY_BASE: &str = "system.db.data-sources";

/// Root directory searched for `<root>/<name>/*` mapper files.
pub const DEFAULT_MAPPER_ROOT: &str = "mappers";

/// Base name of the container's own default resources.
pub const DEFAULT_RESOURCE_NAME: &str = "primary";

pub fn coordinator_name(resource: &str) -> String {
    format!("{}{}", resource, TRANSACTION_COORDINATOR_SUFFIX)
}

pub fn session_factory_name(resource: &str) -> String {
    format!("{}{}", resource, SESSION_FACTORY_SUFFIX)
}

pub fn session_handle_name(resource: &str) -> String {
    format!("{}{}", resource, SESSION_HANDLE_SUFFIX)
}

/// Registered name of the `kind` resource derived from data source `resource`.
pub fn resource_name(kind: ResourceKind, resource: &str) -> String {
    match kind {
        ResourceKind::Pool => resource.to_string(),
        ResourceKind::Coordinator => coordinator_name(resource),
        ResourceKind::SessionFactory => session_factory_name(resource),
        ResourceKind::SessionHandle => session_handle_name(resource),
    }
}

/// `<base>[<index>].<kind-short-name>`
pub fn property_prefix(base: &str, index: usize, kind: PoolKind) -> String {
    format!("{}[{}].{}", base, index, kind.short_name())
}

/// `<root>/<resource>/*`, with glob metacharacters in the root and the
/// resource name matched literally.
pub fn mapper_pattern(root: &Path, resource: &str) -> String {
    let root = glob::Pattern::escape(&root.to_string_lossy());
    Path::new(&root)
        .join(glob::Pattern::escape(resource))
        .join("*")
        .to_string_lossy()
        .into_owned()
}
