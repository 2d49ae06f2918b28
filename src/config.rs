use crate::domain::entities::ResourceSpec;
use crate::domain::error::ConfigError;
use crate::domain::naming::{DEFAULT_MAPPER_ROOT, DEFAULT_PROPERTY_BASE, DEFAULT_RESOURCE_NAME};
use crate::infrastructure::session::ExecutorKind;
use crate::infrastructure::transaction::TxBehavior;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// JSON pointer of the data-source list for a dotted property base
/// (`system.db.data-sources` -> `/system/db/data-sources`).
pub fn data_sources_pointer(base: &str) -> String {
    base.split('.')
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub mapper_root: PathBuf,
    pub default_name: String,
    pub property_base: String,
    pub executor: ExecutorKind,
    pub tx_behavior: TxBehavior,
    pub debug: bool,
    /// Provision, report and exit instead of waiting for a shutdown signal
    pub check_only: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("multids.json"),
            mapper_root: PathBuf::from(DEFAULT_MAPPER_ROOT),
            default_name: DEFAULT_RESOURCE_NAME.to_string(),
            property_base: DEFAULT_PROPERTY_BASE.to_string(),
            executor: ExecutorKind::Simple,
            tx_behavior: TxBehavior::Deferred,
            debug: false,
            check_only: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config_path = std::env::var("MULTIDS_CONFIG_PATH")
            .unwrap_or_else(|_| "multids.json".to_string());

        let mapper_root = std::env::var("MULTIDS_MAPPER_ROOT")
            .unwrap_or_else(|_| DEFAULT_MAPPER_ROOT.to_string());

        let default_name = std::env::var("MULTIDS_DEFAULT_NAME")
            .unwrap_or_else(|_| DEFAULT_RESOURCE_NAME.to_string());

        let property_base = std::env::var("MULTIDS_PROPERTY_BASE")
            .unwrap_or_else(|_| DEFAULT_PROPERTY_BASE.to_string());

        let executor = tag_var("MULTIDS_EXECUTOR", ExecutorKind::from_tag, ExecutorKind::Simple)?;

        let tx_behavior = tag_var("MULTIDS_TX_BEHAVIOR", TxBehavior::from_tag, TxBehavior::Deferred)?;

        let debug = std::env::var("DEBUG").is_ok();

        let check_only = std::env::var("MULTIDS_CHECK_ONLY")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(AppConfig {
            config_path: PathBuf::from(config_path),
            mapper_root: PathBuf::from(mapper_root),
            default_name,
            property_base,
            executor,
            tx_behavior,
            debug,
            check_only,
        })
    }
}

/// Read an enum-valued variable; unknown tags are an error.
fn tag_var<T>(var: &str, parse: fn(&str) -> Option<T>, default: T) -> anyhow::Result<T> {
    match std::env::var(var) {
        Ok(tag) => parse(&tag).ok_or_else(|| anyhow::anyhow!("{}: unknown value `{}`", var, tag)),
        Err(_) => Ok(default),
    }
}

/// Read and parse the JSON configuration tree.
pub fn load_tree(path: &Path) -> Result<Value, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Malformed(format!("{}: {}", path.display(), e)))
}

/// Data-source specs listed under `base`, in declaration order. A missing
/// list is empty.
///
/// `base` is also the root of every pool's property prefix, so late-bound
/// keys are read from the same entries. Unknown `kind` tags are accepted
/// here; they fail when a builder is resolved.
pub fn load_specs(tree: &Value, base: &str) -> Result<Vec<ResourceSpec>, ConfigError> {
    let entries = match tree.pointer(&data_sources_pointer(base)) {
        None | Some(Value::Null) => {
            tracing::debug!("no data sources under {}", base);
            return Ok(Vec::new());
        }
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(ConfigError::Malformed(format!("{} must be an array", base))),
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(entry.clone())
                .map_err(|e| ConfigError::Malformed(format!("{}[{}]: {}", base, index, e)))
        })
        .collect()
}

/// Reject empty and duplicate names.
pub fn validate_specs(specs: &[ResourceSpec]) -> Result<(), ConfigError> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(specs.len());

    for (index, spec) in specs.iter().enumerate() {
        if spec.name.trim().is_empty() {
            return Err(ConfigError::EmptyName { index });
        }
        if let Some(first) = seen.insert(spec.name.as_str(), index) {
            return Err(ConfigError::DuplicateName {
                name: spec.name.clone(),
                first,
                second: index,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.config_path, PathBuf::from("multids.json"));
        assert_eq!(cfg.mapper_root, PathBuf::from("mappers"));
        assert_eq!(cfg.default_name, "primary");
        assert_eq!(cfg.property_base, "system.db.data-sources");
        assert_eq!(cfg.executor, ExecutorKind::Simple);
        assert_eq!(cfg.tx_behavior, TxBehavior::Deferred);
        assert!(!cfg.check_only);
    }

    #[test]
    fn test_load_config_with_mapper_root() {
        std::env::set_var("MULTIDS_MAPPER_ROOT", "/srv/mappers");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.mapper_root, PathBuf::from("/srv/mappers"));
        std::env::remove_var("MULTIDS_MAPPER_ROOT");
    }

    #[test]
    fn test_load_config_with_default_name() {
        std::env::set_var("MULTIDS_DEFAULT_NAME", "main");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.default_name, "main");
        std::env::remove_var("MULTIDS_DEFAULT_NAME");
    }

    #[test]
    fn test_load_config_with_check_only() {
        std::env::set_var("MULTIDS_CHECK_ONLY", "TRUE");
        let cfg = AppConfig::from_env().unwrap();
        assert!(cfg.check_only);
        std::env::remove_var("MULTIDS_CHECK_ONLY");
    }

    #[test]
    fn test_load_config_executor_and_behavior() {
        std::env::set_var("MULTIDS_EXECUTOR", "reuse");
        std::env::set_var("MULTIDS_TX_BEHAVIOR", "immediate");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.executor, ExecutorKind::Reuse);
        assert_eq!(cfg.tx_behavior, TxBehavior::Immediate);
        std::env::remove_var("MULTIDS_EXECUTOR");
        std::env::remove_var("MULTIDS_TX_BEHAVIOR");
    }

    #[test]
    fn test_tag_var_rejects_unknown_value() {
        std::env::set_var("MULTIDS_TEST_EXECUTOR", "batch");
        let err = tag_var("MULTIDS_TEST_EXECUTOR", ExecutorKind::from_tag, ExecutorKind::Simple)
            .unwrap_err();
        assert!(err.to_string().contains("batch"));
        std::env::remove_var("MULTIDS_TEST_EXECUTOR");

        let value = tag_var("MULTIDS_TEST_UNSET", TxBehavior::from_tag, TxBehavior::Exclusive).unwrap();
        assert_eq!(value, TxBehavior::Exclusive);
    }

    #[test]
    fn test_load_specs_in_order() {
        let tree = json!({
            "system": { "db": { "data-sources": [
                { "name": "orders", "kind": "r2d2", "url": "orders.db", "pool": { "max-size": 4 } },
                { "name": "users", "url": ":memory:" }
            ]}}
        });

        let specs = load_specs(&tree, DEFAULT_PROPERTY_BASE).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "orders");
        assert_eq!(specs[0].kind.as_deref(), Some("r2d2"));
        assert_eq!(specs[1].name, "users");
        assert!(specs[1].kind.is_none());
    }

    #[test]
    fn test_data_sources_pointer() {
        assert_eq!(data_sources_pointer("system.db.data-sources"), "/system/db/data-sources");
        assert_eq!(data_sources_pointer("app.pools"), "/app/pools");
        assert_eq!(data_sources_pointer("a/b.c~d"), "/a~1b/c~0d");
    }

    #[test]
    fn test_load_specs_under_custom_base() {
        let tree = json!({
            "system": { "db": { "data-sources": [{ "name": "ignored", "url": ":memory:" }] } },
            "app": { "pools": [{ "name": "alpha", "url": ":memory:" }] }
        });

        let specs = load_specs(&tree, "app.pools").unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "alpha");

        let err = load_specs(&json!({"app": {"pools": [{"name": 1}]}}), "app.pools").unwrap_err();
        assert!(err.to_string().contains("app.pools[0]"));
    }

    #[test]
    fn test_load_specs_missing_list_is_empty() {
        assert!(load_specs(&json!({}), DEFAULT_PROPERTY_BASE).unwrap().is_empty());
        assert!(load_specs(&json!({"system": {"db": {"data-sources": null}}}), DEFAULT_PROPERTY_BASE)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_load_specs_accepts_unknown_kind() {
        let tree = json!({"system": {"db": {"data-sources": [{"name": "x", "kind": "hikari"}]}}});
        assert_eq!(load_specs(&tree, DEFAULT_PROPERTY_BASE).unwrap()[0].kind.as_deref(), Some("hikari"));
    }

    #[test]
    fn test_load_specs_malformed() {
        let tree = json!({"system": {"db": {"data-sources": {"name": "x"}}}});
        assert!(matches!(
            load_specs(&tree, DEFAULT_PROPERTY_BASE),
            Err(ConfigError::Malformed(_))
        ));

        let tree = json!({"system": {"db": {"data-sources": [{"name": 7}]}}});
        let err = load_specs(&tree, DEFAULT_PROPERTY_BASE).unwrap_err();
        assert!(err.to_string().contains("data-sources[0]"));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let specs = vec![ResourceSpec::new("orders", ":memory:"), ResourceSpec::new("", ":memory:")];
        assert!(matches!(
            validate_specs(&specs),
            Err(ConfigError::EmptyName { index: 1 })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let specs = vec![
            ResourceSpec::new("orders", ":memory:"),
            ResourceSpec::new("users", ":memory:"),
            ResourceSpec::new("orders", "other.db"),
        ];
        assert!(matches!(
            validate_specs(&specs),
            Err(ConfigError::DuplicateName { first: 0, second: 2, .. })
        ));
    }

    #[test]
    fn test_load_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multids.json");
        std::fs::write(&path, r#"{"system": {"db": {"data-sources": []}}}"#).unwrap();
        assert!(load_tree(&path)
            .unwrap()
            .pointer(&data_sources_pointer(DEFAULT_PROPERTY_BASE))
            .is_some());

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_tree(&path), Err(ConfigError::Malformed(_))));

        assert!(matches!(
            load_tree(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
