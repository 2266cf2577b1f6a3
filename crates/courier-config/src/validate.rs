//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, LoggingConfig};

/// Validate a fully merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_bus(config)?;
    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_bus(config: &Config) -> ConfigResult<()> {
    if config.bus.name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "bus.name".to_owned(),
            message: "bus name must not be empty".to_owned(),
        });
    }
    if let Some(prefix) = &config.bus.thread_prefix
        && prefix.trim().is_empty()
    {
        return Err(ConfigError::ValidationError {
            field: "bus.thread_prefix".to_owned(),
            message: "thread prefix must not be empty when set".to_owned(),
        });
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.level.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: "log level must not be empty".to_owned(),
        });
    }
    if !LoggingConfig::FORMATS.contains(&logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported format '{}'; expected one of: {}",
                logging.format,
                LoggingConfig::FORMATS.join(", ")
            ),
        });
    }
    Ok(())
}
