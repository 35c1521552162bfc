//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! There is no CLI surface: the device address and characteristic UUID
//! are fixed configuration constants known at start time, with defaults
//! matching the sensor firmware.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Wireless link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_device_address")]
    pub device_address: String,

    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: String,

    #[serde(default = "default_scan_timeout_s")]
    pub scan_timeout_s: u64,

    #[serde(default = "default_reconnect_delay_s")]
    pub reconnect_delay_s: u64,

    #[serde(default = "default_liveness_poll_interval_ms")]
    pub liveness_poll_interval_ms: u64,
}

/// Durable log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_fallback_file")]
    pub fallback_file: String,
}

/// Consumption loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_redraw_interval_ms")]
    pub redraw_interval_ms: u64,

    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// When false the loop runs in the degraded textual mode, echoing
    /// each sample as a log line instead of redrawing a view
    #[serde(default = "default_live_view")]
    pub live_view: bool,
}

// Default value functions
fn default_device_address() -> String { "20:6E:F1:6B:C2:AA".to_string() }
fn default_characteristic_uuid() -> String { "beb5483e-36e1-4688-b7f5-ea07361b26a8".to_string() }
fn default_scan_timeout_s() -> u64 { 10 }
fn default_reconnect_delay_s() -> u64 { 5 }
fn default_liveness_poll_interval_ms() -> u64 { 1000 }

fn default_log_dir() -> String { "logs".to_string() }
fn default_fallback_file() -> String { "fallback_data_log.csv".to_string() }

fn default_redraw_interval_ms() -> u64 { 100 }
fn default_window_size() -> usize { 200 }
fn default_live_view() -> bool { true }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_address: default_device_address(),
            characteristic_uuid: default_characteristic_uuid(),
            scan_timeout_s: default_scan_timeout_s(),
            reconnect_delay_s: default_reconnect_delay_s(),
            liveness_poll_interval_ms: default_liveness_poll_interval_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            fallback_file: default_fallback_file(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            redraw_interval_ms: default_redraw_interval_ms(),
            window_size: default_window_size(),
            live_view: default_live_view(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, or fall back to the
    /// built-in defaults when the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            info!(path = %path.as_ref().display(), "no config file found, using defaults");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !is_bluetooth_address(&self.link.device_address) {
            return Err(crate::error::PowerLoggerError::Config(
                toml::de::Error::custom(format!(
                    "device_address {:?} is not a Bluetooth address (AA:BB:CC:DD:EE:FF)",
                    self.link.device_address
                )),
            ));
        }

        if Uuid::parse_str(&self.link.characteristic_uuid).is_err() {
            return Err(crate::error::PowerLoggerError::Config(
                toml::de::Error::custom(format!(
                    "characteristic_uuid {:?} is not a UUID",
                    self.link.characteristic_uuid
                )),
            ));
        }

        if self.link.scan_timeout_s == 0 || self.link.scan_timeout_s > 120 {
            return Err(crate::error::PowerLoggerError::Config(
                toml::de::Error::custom("scan_timeout_s must be between 1 and 120"),
            ));
        }

        if self.link.reconnect_delay_s == 0 || self.link.reconnect_delay_s > 300 {
            return Err(crate::error::PowerLoggerError::Config(
                toml::de::Error::custom("reconnect_delay_s must be between 1 and 300"),
            ));
        }

        if self.link.liveness_poll_interval_ms < 10 || self.link.liveness_poll_interval_ms > 60000 {
            return Err(crate::error::PowerLoggerError::Config(
                toml::de::Error::custom("liveness_poll_interval_ms must be between 10 and 60000"),
            ));
        }

        if self.storage.log_dir.is_empty() {
            return Err(crate::error::PowerLoggerError::Config(
                toml::de::Error::custom("log_dir cannot be empty"),
            ));
        }

        if self.storage.fallback_file.is_empty() {
            return Err(crate::error::PowerLoggerError::Config(
                toml::de::Error::custom("fallback_file cannot be empty"),
            ));
        }

        if self.display.redraw_interval_ms < 10 || self.display.redraw_interval_ms > 60000 {
            return Err(crate::error::PowerLoggerError::Config(
                toml::de::Error::custom("redraw_interval_ms must be between 10 and 60000"),
            ));
        }

        if self.display.window_size == 0 {
            return Err(crate::error::PowerLoggerError::Config(
                toml::de::Error::custom("window_size must be greater than 0"),
            ));
        }

        Ok(())
    }
}

fn is_bluetooth_address(address: &str) -> bool {
    let octets: Vec<&str> = address.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.link.device_address, "20:6E:F1:6B:C2:AA");
        assert_eq!(config.link.reconnect_delay_s, 5);
        assert_eq!(config.link.liveness_poll_interval_ms, 1000);
        assert_eq!(config.display.redraw_interval_ms, 100);
        assert_eq!(config.display.window_size, 200);
        assert_eq!(config.storage.log_dir, "logs");
    }

    #[test]
    fn test_invalid_device_address() {
        for address in ["", "20:6E:F1:6B:C2", "20:6E:F1:6B:C2:ZZ", "206EF16BC2AA"] {
            let mut config = Config::default();
            config.link.device_address = address.to_string();
            assert!(config.validate().is_err(), "address {:?} should fail", address);
        }
    }

    #[test]
    fn test_invalid_characteristic_uuid() {
        let mut config = Config::default();
        config.link.characteristic_uuid = "beb5483e".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_delay_bounds() {
        let mut config = Config::default();
        config.link.reconnect_delay_s = 0;
        assert!(config.validate().is_err());
        config.link.reconnect_delay_s = 301;
        assert!(config.validate().is_err());
        config.link.reconnect_delay_s = 300;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_liveness_poll_bounds() {
        let mut config = Config::default();
        config.link.liveness_poll_interval_ms = 5;
        assert!(config.validate().is_err());
        config.link.liveness_poll_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redraw_interval_bounds() {
        let mut config = Config::default();
        config.display.redraw_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_size_zero() {
        let mut config = Config::default();
        config.display.window_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir() {
        let mut config = Config::default();
        config.storage.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[link]
device_address = "AA:BB:CC:DD:EE:FF"
reconnect_delay_s = 2

[storage]
log_dir = "/tmp/telemetry"

[display]
window_size = 50
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.link.device_address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.link.reconnect_delay_s, 2);
        assert_eq!(config.storage.log_dir, "/tmp/telemetry");
        assert_eq!(config.display.window_size, 50);
        // Unset fields keep their defaults
        assert_eq!(config.display.redraw_interval_ms, 100);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = "[display]\nwindow_size = 0\n";
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_with_missing_file() {
        let config = Config::load_or_default("/nonexistent/power-logger.toml").unwrap();
        assert_eq!(config.link.device_address, default_device_address());
    }
}
