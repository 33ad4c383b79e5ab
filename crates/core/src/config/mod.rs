//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CRAWLABLE_*)
//! 2. TOML config file (if CRAWLABLE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CRAWLABLE_*)
/// 2. TOML config file (if CRAWLABLE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Force the https scheme in reconstructed URLs.
    ///
    /// Needed behind reverse proxies that terminate TLS, where the inbound
    /// request scheme cannot be trusted.
    /// Set via CRAWLABLE_FORCE_HTTPS environment variable.
    #[serde(default)]
    pub force_https: bool,

    /// CSS selector whose presence marks the page as rendered.
    ///
    /// Set via CRAWLABLE_CSS_SELECTOR environment variable.
    #[serde(default = "default_css_selector")]
    pub css_selector: String,

    /// Whether to use a pre-existing, externally managed browser endpoint
    /// instead of launching a local one.
    ///
    /// Set via CRAWLABLE_DEDICATED_MODE environment variable.
    #[serde(default)]
    pub dedicated_mode: bool,

    /// Devtools port of the dedicated browser endpoint.
    ///
    /// Set via CRAWLABLE_DEDICATED_PORT environment variable.
    #[serde(default = "default_dedicated_port")]
    pub dedicated_port: u16,

    /// Startup arguments for a locally launched browser.
    ///
    /// Set via CRAWLABLE_DRIVER_ARGS environment variable.
    #[serde(default = "default_driver_args")]
    pub driver_args: Vec<String>,

    /// Total bounded wait for the readiness selector, in milliseconds.
    ///
    /// Set via CRAWLABLE_READY_TIMEOUT_MS environment variable.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// Granularity of the DOM readiness poll, in milliseconds.
    ///
    /// Set via CRAWLABLE_POLL_INTERVAL_MS environment variable.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on any single automation call, in milliseconds.
    ///
    /// Set via CRAWLABLE_SCRIPT_TIMEOUT_MS environment variable.
    #[serde(default = "default_script_timeout_ms")]
    pub script_timeout_ms: u64,

    /// Path to the SQLite cache database.
    ///
    /// Set via CRAWLABLE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Listen address for the gateway.
    ///
    /// Set via CRAWLABLE_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_css_selector() -> String {
    "#content".into()
}

fn default_dedicated_port() -> u16 {
    8910
}

fn default_driver_args() -> Vec<String> {
    let storage = std::env::temp_dir().join("crawlable");
    vec![
        "--blink-settings=imagesEnabled=false".into(),
        format!("--disk-cache-dir={}", storage.join("disk-cache").display()),
        format!("--user-data-dir={}", storage.join("profile").display()),
    ]
}

fn default_ready_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_script_timeout_ms() -> u64 {
    30_000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./crawlable-cache.sqlite")
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            force_https: false,
            css_selector: default_css_selector(),
            dedicated_mode: false,
            dedicated_port: default_dedicated_port(),
            driver_args: default_driver_args(),
            ready_timeout_ms: default_ready_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            script_timeout_ms: default_script_timeout_ms(),
            db_path: default_db_path(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl AppConfig {
    /// Total readiness wait as a Duration.
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Readiness poll granularity as a Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-automation-call bound as a Duration.
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CRAWLABLE_`
    /// 2. TOML file from `CRAWLABLE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CRAWLABLE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CRAWLABLE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.force_https);
        assert_eq!(config.css_selector, "#content");
        assert!(!config.dedicated_mode);
        assert_eq!(config.dedicated_port, 8910);
        assert_eq!(config.ready_timeout_ms, 5_000);
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.script_timeout_ms, 30_000);
        assert_eq!(config.db_path, PathBuf::from("./crawlable-cache.sqlite"));
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_default_driver_args_disable_images() {
        let config = AppConfig::default();
        assert!(
            config
                .driver_args
                .iter()
                .any(|a| a.contains("imagesEnabled=false"))
        );
    }

    #[test]
    fn test_timeout_durations() {
        let config = AppConfig::default();
        assert_eq!(config.ready_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.poll_interval(), Duration::from_millis(2_000));
        assert_eq!(config.script_timeout(), Duration::from_millis(30_000));
    }
}
