//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TelemetryError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Endpoint to open. Empty means "first enumerated port".
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Heartbeat and connection health configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_heartbeat_marker")]
    pub heartbeat_marker: String,

    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
}

/// Time-series store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_max_points")]
    pub max_points: usize,

    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

/// CSV session logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_record_interval_ms")]
    pub record_interval_ms: u64,

    /// Record "hold last value" padding samples as if they were telemetry
    #[serde(default)]
    pub include_padding: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

/// Signal catalog location
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

/// Baud rates the boat firmware can be flashed with
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

// Default value functions
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 100 }
fn default_poll_interval_ms() -> u64 { 5 }

fn default_heartbeat_marker() -> String { "OK".to_string() }
fn default_heartbeat_timeout_ms() -> u64 { 1000 }

fn default_max_points() -> usize { 2000 }
fn default_stale_after_ms() -> u64 { 500 }

fn default_record_interval_ms() -> u64 { 25 }
fn default_log_dir() -> String { "./logs".to_string() }

fn default_catalog_path() -> String { "database.json".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            heartbeat_marker: default_heartbeat_marker(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
            stale_after_ms: default_stale_after_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            record_interval_ms: default_record_interval_ms(),
            include_padding: false,
            log_dir: default_log_dir(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { path: default_catalog_path() }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl LinkConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

impl StoreConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl LoggingConfig {
    pub fn record_interval(&self) -> Duration {
        Duration::from_millis(self.record_interval_ms)
    }
}

fn invalid(msg: impl Into<String>) -> TelemetryError {
    TelemetryError::InvalidConfig(msg.into())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Every section and field is optional; missing values take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sail_telemetry::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {}",
                SUPPORTED_BAUD_RATES
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        let marker = &self.link.heartbeat_marker;
        if marker.trim().is_empty() {
            return Err(invalid("heartbeat_marker cannot be empty"));
        }
        if marker.contains(':') || marker.contains('\r') || marker.contains('\n') {
            return Err(invalid("heartbeat_marker cannot contain ':' or line breaks"));
        }

        if self.link.heartbeat_timeout_ms == 0 || self.link.heartbeat_timeout_ms > 60000 {
            return Err(invalid("heartbeat_timeout_ms must be between 1 and 60000"));
        }

        if self.store.max_points == 0 {
            return Err(invalid("max_points must be greater than 0"));
        }

        if self.store.stale_after_ms == 0 || self.store.stale_after_ms > 60000 {
            return Err(invalid("stale_after_ms must be between 1 and 60000"));
        }

        if self.logging.record_interval_ms == 0 || self.logging.record_interval_ms > 60000 {
            return Err(invalid("record_interval_ms must be between 1 and 60000"));
        }

        if self.logging.log_dir.is_empty() {
            return Err(invalid("logging log_dir cannot be empty"));
        }

        Ok(())
    }
}
