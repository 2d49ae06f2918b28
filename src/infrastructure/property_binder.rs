//! Property binding for pool tuning
//!
//! Turns loosely typed key/value pairs (the `pool` section of a data source,
//! or ambient properties under a pool's prefix) into [`TuningOverrides`].
//! Keys are matched case-insensitively and without separators, so
//! `max-size`, `max_size` and `maxSize` all bind the same field.

use crate::domain::entities::ResourceSpec;
use crate::domain::ports::PropertySource;
use crate::domain::value_objects::{PoolTuning, TuningOverrides};
use std::time::Duration;

/// A recognized key whose value could not be converted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("property `{key}` has invalid value `{value}`: {reason}")]
pub struct BindError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

impl BindError {
    fn new(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Lowercase and drop `-`/`_` separators.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_u32(key: &str, value: &str) -> Result<u32, BindError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| BindError::new(key, value, e.to_string()))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, BindError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| BindError::new(key, value, e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, BindError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(BindError::new(key, value, "expected a boolean")),
    }
}

/// Seconds, where 0 disables the timeout.
fn parse_optional_secs(key: &str, value: &str) -> Result<Option<Duration>, BindError> {
    let secs = parse_u64(key, value)?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

/// Bind a single key into `overrides`. Returns `false` for unknown keys.
fn bind_one(overrides: &mut TuningOverrides, key: &str, value: &str) -> Result<bool, BindError> {
    match normalize_key(key).as_str() {
        "maxsize" => overrides.max_size = Some(parse_u32(key, value)?),
        "minidle" => overrides.min_idle = Some(parse_u32(key, value)?),
        "connectiontimeoutms" => {
            overrides.connection_timeout = Some(Duration::from_millis(parse_u64(key, value)?))
        }
        "idletimeoutsecs" => overrides.idle_timeout = Some(parse_optional_secs(key, value)?),
        "maxlifetimesecs" => overrides.max_lifetime = Some(parse_optional_secs(key, value)?),
        "testonborrow" => overrides.test_on_borrow = Some(parse_bool(key, value)?),
        "validationquery" => {
            let query = value.trim();
            if query.is_empty() {
                return Err(BindError::new(key, value, "validation query is empty"));
            }
            overrides.validation_query = Some(query.to_string());
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Bind a set of key/value pairs. Unknown keys are ignored.
pub fn bind_entries<I, K, V>(entries: I) -> Result<TuningOverrides, BindError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut overrides = TuningOverrides::default();
    for (key, value) in entries {
        let (key, value) = (key.as_ref(), value.as_ref());
        if !bind_one(&mut overrides, key, value)? {
            tracing::debug!("ignoring unknown pool property `{}`", key);
        }
    }
    Ok(overrides)
}

/// Bind every property found under `prefix` in the ambient source.
pub fn bind_from_source(
    source: &dyn PropertySource,
    prefix: &str,
) -> Result<TuningOverrides, BindError> {
    bind_entries(source.entries_under(prefix))
}

/// Effective tuning at build time: defaults plus the spec's `pool` section.
pub fn build_time_tuning(spec: &ResourceSpec) -> Result<PoolTuning, BindError> {
    let entries = spec.tuning.iter().filter_map(|(key, value)| {
        let rendered = match value {
            serde_json::Value::Null => return None,
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Some((key.as_str(), rendered))
    });

    let mut tuning = PoolTuning::default();
    tuning.apply(&bind_entries(entries)?);
    tuning
        .validate()
        .map_err(|reason| BindError::new("pool", &spec.name, reason))?;
    Ok(tuning)
}
