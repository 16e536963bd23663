//! PillSrv configuration
//!
//! Layered with figment: built-in defaults < YAML file < `PILLSRV_*` environment.

use common::LoggingConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::domain::SLOT_COUNT;
use crate::error::{PillError, Result};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/pillsrv.yaml";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PillsrvConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Which output adapter drives the LEDs, buzzers and buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceBackend {
    #[default]
    Simulated,
    Physical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub backend: DeviceBackend,
    /// Read slot numbers from stdin as button presses (simulated backend only)
    #[serde(default = "default_true")]
    pub console_input: bool,
    /// BCM pin per slot button, reads high while pressed
    #[serde(default = "default_button_pins")]
    pub button_pins: Vec<u8>,
    /// BCM pin per slot LED
    #[serde(default = "default_led_pins")]
    pub led_pins: Vec<u8>,
    /// Buzzer pins, all driven together
    #[serde(default = "default_buzzer_pins")]
    pub buzzer_pins: Vec<u8>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: DeviceBackend::default(),
            console_input: default_true(),
            button_pins: default_button_pins(),
            led_pins: default_led_pins(),
            buzzer_pins: default_buzzer_pins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Seconds between schedule scans
    #[serde(default = "default_scan_interval")]
    pub interval_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_scan_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Button poll period
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Quiet window after an acknowledged press
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_ms: default_poll_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_service_name() -> String {
    "pillsrv".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> String {
    "data/pillsrv.db".to_string()
}

fn default_true() -> bool {
    true
}

fn default_button_pins() -> Vec<u8> {
    vec![16, 27, 22, 10, 9]
}

fn default_led_pins() -> Vec<u8> {
    vec![12, 5, 6, 13, 19]
}

fn default_buzzer_pins() -> Vec<u8> {
    vec![14, 15]
}

fn default_scan_interval() -> u64 {
    30
}

fn default_poll_ms() -> u64 {
    50
}

fn default_debounce_ms() -> u64 {
    1000
}

impl PillsrvConfig {
    /// Load configuration
    ///
    /// A missing file at the default location is fine; an explicitly given
    /// path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(PillsrvConfig::default()));

        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(PillError::config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                figment = figment.merge(Yaml::file(p));
            },
            None => figment = figment.merge(Yaml::file(DEFAULT_CONFIG_PATH)),
        }

        let config: PillsrvConfig = figment
            .merge(Env::prefixed("PILLSRV_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.service.port == 0 {
            return Err(PillError::config("service.port must be non-zero"));
        }
        if self.database.path.trim().is_empty() {
            return Err(PillError::config("database.path must not be empty"));
        }
        if self.scanner.interval_secs == 0 {
            return Err(PillError::config("scanner.interval_secs must be at least 1"));
        }
        if self.scanner.interval_secs > 60 {
            warn!(
                "scanner.interval_secs is {}s; alarms due between scans may be missed",
                self.scanner.interval_secs
            );
        }
        if self.monitor.poll_ms == 0 {
            return Err(PillError::config("monitor.poll_ms must be at least 1"));
        }

        let device = &self.device;
        if device.button_pins.len() != SLOT_COUNT {
            return Err(PillError::config(format!(
                "device.button_pins needs {} entries, got {}",
                SLOT_COUNT,
                device.button_pins.len()
            )));
        }
        if device.led_pins.len() != SLOT_COUNT {
            return Err(PillError::config(format!(
                "device.led_pins needs {} entries, got {}",
                SLOT_COUNT,
                device.led_pins.len()
            )));
        }
        if device.buzzer_pins.is_empty() {
            return Err(PillError::config("device.buzzer_pins must not be empty"));
        }

        let mut seen = HashSet::new();
        for pin in device
            .button_pins
            .iter()
            .chain(&device.led_pins)
            .chain(&device.buzzer_pins)
        {
            if !seen.insert(*pin) {
                return Err(PillError::config(format!("GPIO pin {} is used twice", pin)));
            }
        }

        Ok(())
    }

    /// Render the default configuration as YAML
    pub fn generate_default_config() -> Result<String> {
        serde_yaml::to_string(&PillsrvConfig::default())
            .map_err(|e| PillError::config(format!("failed to render defaults: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PillsrvConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.service.port, 5000);
        assert_eq!(config.device.backend, DeviceBackend::Simulated);
        assert_eq!(config.monitor.debounce_ms, 1000);
    }

    #[test]
    fn test_rejects_duplicate_pins() {
        let mut config = PillsrvConfig::default();
        config.device.buzzer_pins = vec![16];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_wrong_pin_count() {
        let mut config = PillsrvConfig::default();
        config.device.led_pins.pop();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let mut config = PillsrvConfig::default();
        config.scanner.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "service:\n  port: 8080\ndevice:\n  backend: physical\nscanner:\n  interval_secs: 10"
        )
        .unwrap();

        let config = PillsrvConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.name, "pillsrv");
        assert_eq!(config.device.backend, DeviceBackend::Physical);
        assert_eq!(config.scanner.interval_secs, 10);
        assert_eq!(config.monitor.poll_ms, 50);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = PillsrvConfig::load(Some(Path::new("/nonexistent/pillsrv.yaml")));
        assert!(matches!(result, Err(PillError::Config(_))));
    }

    #[test]
    fn test_default_config_round_trips() {
        let yaml = PillsrvConfig::generate_default_config().unwrap();
        let parsed: PillsrvConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.device.button_pins, vec![16, 27, 22, 10, 9]);
    }
}
