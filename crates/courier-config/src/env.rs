//! Environment variable fallbacks.
//!
//! Env vars are fallback, not override: they only fill fields that no config
//! file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{FieldSet, set_path};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    /// Enum-like values are matched case-insensitively.
    lowercase: bool,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "COURIER_BUS_NAME",
        field_path: "bus.name",
        lowercase: false,
    },
    EnvMapping {
        var_name: "COURIER_ASYNC_BACKEND",
        field_path: "bus.async_backend",
        lowercase: true,
    },
    EnvMapping {
        var_name: "COURIER_LOG_LEVEL",
        field_path: "logging.level",
        lowercase: true,
    },
    EnvMapping {
        var_name: "COURIER_LOG_FORMAT",
        field_path: "logging.format",
        lowercase: true,
    },
];

/// Snapshot the `COURIER_*` variables of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("COURIER_"))
        .collect()
}

/// Apply env fallbacks for every mapped field not present in `file_fields`.
///
/// Returns the number of fields filled from the environment.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    file_fields: &FieldSet,
    env_vars: &HashMap<String, String>,
) -> usize {
    let mut applied = 0usize;
    for mapping in ENV_MAPPINGS {
        if file_fields.contains(mapping.field_path) {
            continue;
        }
        let Some(value) = env_vars.get(mapping.var_name) else {
            continue;
        };
        if value.trim().is_empty() {
            continue;
        }
        debug!(var = mapping.var_name, field = mapping.field_path, "env fallback applied");
        let value = if mapping.lowercase {
            value.trim().to_ascii_lowercase()
        } else {
            value.clone()
        };
        set_path(merged, mapping.field_path, toml::Value::String(value));
        applied = applied.saturating_add(1);
    }
    applied
}
