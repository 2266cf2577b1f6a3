//! Config file loading.
//!
//! `Config::load()` runs:
//! 1. Parse embedded `defaults.toml` as the base
//! 2. Merge the optional config file over it
//! 3. Fill fields the file left unset from `COURIER_*` env vars
//! 4. Deserialize and validate

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{FieldSet, deep_merge};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Largest config file accepted.
pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Load configuration from defaults, an optional file, and the process env.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, or if the
/// merged configuration fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<Config> {
    load_with_env(path, &collect_env_vars())
}

/// Like [`load`], with an explicit environment snapshot.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env(
    path: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<Config> {
    let mut merged = parse_toml(DEFAULTS_TOML, "<embedded defaults>")?;
    let mut file_fields = FieldSet::new();

    if let Some(path) = path {
        let overlay = read_toml(path)?;
        deep_merge(&mut merged, &overlay, "", &mut file_fields);
        info!(path = %path.display(), "loaded courier config");
    }

    let env_count = apply_env_fallbacks(&mut merged, &file_fields, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    finish(merged, "<merged config>")
}

/// Load a config from a single file over the embedded defaults, ignoring
/// the environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    load_with_env(Some(path), &HashMap::new())
}

/// Parse a TOML document over the embedded defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the document is malformed or invalid.
pub fn from_toml_str(content: &str) -> ConfigResult<Config> {
    let mut merged = parse_toml(DEFAULTS_TOML, "<embedded defaults>")?;
    let overlay = parse_toml(content, "<inline>")?;
    deep_merge(&mut merged, &overlay, "", &mut FieldSet::new());
    finish(merged, "<inline>")
}

fn finish(merged: toml::Value, label: &str) -> ConfigResult<Config> {
    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: label.to_owned(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

fn read_toml(path: &Path) -> ConfigResult<toml::Value> {
    let metadata = std::fs::metadata(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_toml(&content, &path.display().to_string())
}

fn parse_toml(content: &str, label: &str) -> ConfigResult<toml::Value> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: label.to_owned(),
        source: e,
    })
}
