//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_delivery(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_delivery(config: &Config) -> ConfigResult<()> {
    let valid_modes = ["queued", "inline"];
    if !valid_modes.contains(&config.delivery.mode.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "delivery.mode".to_owned(),
            message: format!(
                "unsupported delivery mode '{}'; expected one of: {}",
                config.delivery.mode,
                valid_modes.join(", ")
            ),
        });
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    if let Some(bad) = config.logging.directives.iter().find(|d| d.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: "logging.directives".to_owned(),
            message: format!("empty directive '{bad}'"),
        });
    }

    Ok(())
}
