// src/config.rs
//! Configuration management with per-user storage

use crate::error::{GpsError, Result};
use crate::session::{SessionConfig, DEFAULT_BAUDRATE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest timeout accepted from the config file or the command line.
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub serial_port: Option<String>,
    pub baudrate: u32,
    pub read_timeout_ms: u64,
    pub idle_timeout_secs: f64,
    pub download_timeout_secs: f64,
    pub settle_delay_ms: u64,
    pub port_settle_ms: u64,
    pub output_dir: PathBuf,
    pub auto_create_dir: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial_port: None,
            baudrate: DEFAULT_BAUDRATE,
            read_timeout_ms: 1000,
            idle_timeout_secs: 3.0,
            download_timeout_secs: 60.0,
            settle_delay_ms: 200,
            port_settle_ms: 2000,
            output_dir: PathBuf::from("downloads"),
            auto_create_dir: true,
        }
    }
}

impl DeviceConfig {
    /// Load configuration from the user's config file, or defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| GpsError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GpsError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the user's config file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GpsError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(path, contents)
            .map_err(|e| GpsError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get the config file path
    pub fn get_config_path() -> Result<PathBuf> {
        #[cfg(windows)]
        let base = std::env::var("APPDATA")
            .map(PathBuf::from)
            .map_err(|_| GpsError::Config("APPDATA environment variable not set".to_string()))?;

        #[cfg(not(windows))]
        let base = std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .map_err(|_| GpsError::Config("HOME environment variable not set".to_string()))?;

        Ok(base.join("wanggan-gps").join("config.json"))
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.baudrate == 0 {
            return Err(GpsError::Config("baudrate must be positive".to_string()));
        }
        for (name, secs) in [
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("download_timeout_secs", self.download_timeout_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 || secs > MAX_TIMEOUT_SECS {
                return Err(GpsError::Config(format!(
                    "{} must be between 0 and {} seconds, got {}",
                    name, MAX_TIMEOUT_SECS, secs
                )));
            }
        }
        Ok(())
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.serial_port = Some(port);
        self.baudrate = baudrate;
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn port_settle(&self) -> Duration {
        Duration::from_millis(self.port_settle_ms)
    }

    /// Timing used by the export session
    pub fn session_config(&self) -> Result<SessionConfig> {
        self.validate()?;
        Ok(SessionConfig {
            idle_timeout: seconds("idle_timeout_secs", self.idle_timeout_secs)?,
            overall_timeout: seconds("download_timeout_secs", self.download_timeout_secs)?,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            ..SessionConfig::default()
        })
    }
}

fn seconds(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| GpsError::Config(format!("{} is not a usable duration: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeviceConfig::default();
        assert_eq!(config.baudrate, 115_200);
        assert_eq!(config.serial_port, None);
        assert_eq!(config.session_config().unwrap(), SessionConfig::default());
    }

    #[test]
    fn test_update_serial() {
        let mut config = DeviceConfig::default();
        config.update_serial("/dev/ttyUSB0".to_string(), 115200);
        assert_eq!(config.serial_port, Some("/dev/ttyUSB0".to_string()));
        assert_eq!(config.baudrate, 115200);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = DeviceConfig::default();
        config.update_serial("COM5".to_string(), 115200);
        config.idle_timeout_secs = 5.0;
        config.save_to(&path).unwrap();

        let loaded = DeviceConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.session_config().unwrap().idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = DeviceConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, DeviceConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "serial_port": "/dev/ttyACM0" }"#).unwrap();

        let loaded = DeviceConfig::load_from(&path).unwrap();
        assert_eq!(loaded.serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(loaded.download_timeout_secs, 60.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "idle_timeout_secs": -1.0 }"#).unwrap();
        assert!(matches!(DeviceConfig::load_from(&path), Err(GpsError::Config(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(DeviceConfig::load_from(&path), Err(GpsError::Config(_))));
    }

    #[test]
    fn test_huge_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "download_timeout_secs": 1e30 }"#).unwrap();
        assert!(matches!(DeviceConfig::load_from(&path), Err(GpsError::Config(_))));
    }

    #[test]
    fn test_overridden_timeouts_do_not_panic() {
        let mut config = DeviceConfig::default();
        config.idle_timeout_secs = -1.0;
        assert!(matches!(config.session_config(), Err(GpsError::Config(_))));

        config.idle_timeout_secs = f64::NAN;
        assert!(matches!(config.session_config(), Err(GpsError::Config(_))));

        config.idle_timeout_secs = 3.0;
        config.download_timeout_secs = 1e30;
        assert!(matches!(config.session_config(), Err(GpsError::Config(_))));

        config.download_timeout_secs = MAX_TIMEOUT_SECS;
        let session = config.session_config().unwrap();
        assert_eq!(session.overall_timeout, Duration::from_secs(86_400));
    }
}
