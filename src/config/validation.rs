//! Configuration validation.

use crate::config::{AddressMode, Config};

/// Validate the configuration.
///
/// Checks for:
/// - A known log level
/// - A usable connection pool size
/// - Non-zero variant ports
/// - Local address mode only in single-server deployments
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing the problem.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    // Validate log level
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.global.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.global.log_level,
            valid_levels.join(", ")
        ));
    }

    // The pool must be able to hold at least one connection
    if config.store.max_idle == 0 {
        errors.push("store max_idle must be >= 1".to_string());
    }

    if config.store.host.is_empty() {
        errors.push("store host cannot be empty".to_string());
    }

    // Variant ports must be real ports
    if config.routing.ports.threedi == 0 {
        errors.push("port for model type '3di' cannot be 0".to_string());
    }
    if config.routing.ports.urban == 0 {
        errors.push("port for model type '3di-urban' cannot be 0".to_string());
    }

    // Local addressing has no store to resolve a workload from
    if config.routing.address_mode == AddressMode::Local && config.routing.single_server.is_none()
    {
        errors.push(
            "local address mode requires a single_server subgrid id".to_string(),
        );
    }

    if let Some(subgrid_id) = &config.routing.single_server {
        if subgrid_id.is_empty() {
            errors.push("single_server subgrid id cannot be empty".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}
