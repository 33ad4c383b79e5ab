//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `css_selector` is empty
    /// - `dedicated_port` is 0
    /// - `poll_interval_ms` is 0 or exceeds `ready_timeout_ms`
    /// - `script_timeout_ms` is below 1s or exceeds 5 minutes
    /// - `bind_addr` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.css_selector.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "css_selector".into(), reason: "must not be empty".into() });
        }

        if self.dedicated_port == 0 {
            return Err(ConfigError::Invalid { field: "dedicated_port".into(), reason: "must be nonzero".into() });
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid { field: "poll_interval_ms".into(), reason: "must be nonzero".into() });
        }
        if self.poll_interval_ms > self.ready_timeout_ms {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms".into(),
                reason: "must not exceed ready_timeout_ms".into(),
            });
        }

        if self.script_timeout_ms < 1_000 {
            return Err(ConfigError::Invalid {
                field: "script_timeout_ms".into(),
                reason: "must be at least 1s (1000ms)".into(),
            });
        }
        if self.script_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "script_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.bind_addr.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "bind_addr".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_selector() {
        let config = AppConfig { css_selector: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "css_selector"));
    }

    #[test]
    fn test_validate_zero_dedicated_port() {
        let config = AppConfig { dedicated_port: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "dedicated_port"));
    }

    #[test]
    fn test_validate_poll_interval_exceeds_ready_timeout() {
        let config = AppConfig { poll_interval_ms: 6_000, ready_timeout_ms: 5_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "poll_interval_ms"));
    }

    #[test]
    fn test_validate_script_timeout_too_small() {
        let config = AppConfig { script_timeout_ms: 500, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "script_timeout_ms"));
    }

    #[test]
    fn test_validate_script_timeout_exceeds_limit() {
        let config = AppConfig { script_timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "script_timeout_ms"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            script_timeout_ms: 1_000,
            poll_interval_ms: 5_000,
            ready_timeout_ms: 5_000,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
