//! Configuration validation.

use crate::config::Config;
use std::collections::HashSet;
use std::time::Duration;

/// Validate the configuration.
///
/// Checks for:
/// - At least one backend
/// - Unique backend addresses
/// - No backend pointing at the listen address
/// - A usable probe schedule (non-zero interval, timeout shorter than it)
/// - A known log level
///
/// # Returns
///
/// `Ok(())` if valid, or a message describing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push("at least one backend must be defined".to_string());
    }

    let mut seen = HashSet::new();
    for address in &config.backends {
        if !seen.insert(address) {
            errors.push(format!("duplicate backend address: {}", address));
        }

        if *address == config.listen {
            errors.push(format!(
                "backend address {} matches the listen address",
                address
            ));
        }
    }

    if config.health_check.interval == Duration::ZERO {
        errors.push("health check interval must be greater than zero".to_string());
    } else {
        let timeout = config.health_check.probe_timeout();
        if timeout == Duration::ZERO {
            errors.push("health check timeout must be greater than zero".to_string());
        } else if timeout >= config.health_check.interval {
            errors.push(format!(
                "health check timeout ({}) must be shorter than the interval ({})",
                humantime::format_duration(timeout),
                humantime::format_duration(config.health_check.interval)
            ));
        }
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.log_level,
            valid_levels.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HealthCheckConfig, LogFormat};

    fn minimal_config() -> Config {
        Config {
            listen: "127.0.0.1:8080".parse().unwrap(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            health_check: HealthCheckConfig::default(),
            backends: vec![
                "127.0.0.1:9001".parse().unwrap(),
                "127.0.0.1:9002".parse().unwrap(),
            ],
        }
    }

    #[test]
    fn test_valid_config() {
        let config = minimal_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_no_backends() {
        let mut config = minimal_config();
        config.backends.clear();
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("at least one backend"));
    }

    #[test]
    fn test_duplicate_backend_address() {
        let mut config = minimal_config();
        config.backends.push("127.0.0.1:9001".parse().unwrap());
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("duplicate backend address"));
    }

    #[test]
    fn test_backend_matches_listen_address() {
        let mut config = minimal_config();
        config.backends.push(config.listen);
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("matches the listen address"));
    }

    #[test]
    fn test_zero_interval() {
        let mut config = minimal_config();
        config.health_check.interval = Duration::ZERO;
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("interval must be greater"));
    }

    #[test]
    fn test_timeout_not_shorter_than_interval() {
        let mut config = minimal_config();
        config.health_check.interval = Duration::from_secs(2);
        config.health_check.timeout = Some(Duration::from_secs(2));
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("shorter than the interval"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = minimal_config();
        config.log_level = "verbose".to_string();
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("invalid log level"));
    }

    #[test]
    fn test_multiple_errors_reported_together() {
        let mut config = minimal_config();
        config.backends.clear();
        config.log_level = "loud".to_string();
        let message = validate_config(&config).unwrap_err();
        assert!(message.contains("at least one backend"));
        assert!(message.contains("invalid log level"));
    }
}
