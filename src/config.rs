//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `station.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SerialConfig: device path, baud rate, read timeout.
//!     - StationConfig: the fixed lat/lon this deployment represents.
//!     - BufferConfig: how many readings the series store keeps.
//!     - ReconnectConfig: optional bounded retry when the port won't open.
//!     - ServerConfig: where the http api listens.
//!     - LoggingConfig: default tracing filter.
//!
//! every section has defaults, so a partial file (or none at all) works.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub serial: SerialConfig,
    pub station: StationConfig,
    pub buffer: BufferConfig,
    pub reconnect: ReconnectConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialConfig {
    pub path: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Largest single read from the port.
    pub read_chunk: usize,
    /// Bytes tolerated without a closing ENDATA before the backlog is trimmed.
    pub max_pending: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct StationConfig {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Extra connect attempts after the first one fails. 0 = give up at once.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log every accepted reading at info instead of debug.
    pub show_sensor_data: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 1000,
            read_chunk: 1024,
            max_pending: crate::frame::DEFAULT_MAX_PENDING,
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self { lat: 46.2276, lon: 2.2137 }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: crate::store::DEFAULT_CAPACITY }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:5000".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl ReconnectConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: HostConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("station.toml"),
            PathBuf::from("..").join("config").join("station.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Reject values that parse but can't work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.serial.path.trim().is_empty() {
            return invalid("serial.path must not be empty");
        }
        if self.serial.baud_rate == 0 {
            return invalid("serial.baud_rate must be greater than 0");
        }
        if self.serial.read_timeout_ms == 0 {
            return invalid("serial.read_timeout_ms must be greater than 0");
        }
        if self.serial.read_chunk == 0 {
            return invalid("serial.read_chunk must be greater than 0");
        }
        if self.serial.max_pending < 64 {
            return invalid("serial.max_pending must be at least 64");
        }
        if self.buffer.capacity == 0 {
            return invalid("buffer.capacity must be at least 1");
        }
        let StationConfig { lat, lon } = self.station;
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return invalid("station.lat must be within [-90, 90]");
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return invalid("station.lon must be within [-180, 180]");
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│          STATION CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Device: {} @ {} baud", self.serial.path, self.serial.baud_rate);
        println!("│ Read Timeout: {}ms", self.serial.read_timeout_ms);
        println!("│ Station: {:.4}, {:.4}", self.station.lat, self.station.lon);
        println!("│ Buffer Capacity: {}", self.buffer.capacity);
        println!("│ Reconnect Attempts: {}", self.reconnect.max_attempts);
        println!("│ Listen: {}", self.server.bind);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_deployment() {
        let config = HostConfig::default();
        assert_eq!(config.serial.path, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.buffer.capacity, 10);
        assert_eq!(config.station, StationConfig { lat: 46.2276, lon: 2.2137 });
        assert_eq!(config.reconnect.max_attempts, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config: HostConfig = toml::from_str(
            r#"
            [serial]
            path = "/dev/ttyACM0"
            baud_rate = 115200

            [buffer]
            capacity = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.serial.path, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.read_timeout_ms, 1000);
        assert_eq!(config.buffer.capacity, 50);
        assert_eq!(config.server.bind, "0.0.0.0:5000");
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let mut config = HostConfig::default();
        config.buffer.capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = HostConfig::default();
        config.serial.read_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = HostConfig::default();
        config.station.lat = 120.0;
        assert!(config.validate().is_err());

        let mut config = HostConfig::default();
        config.station.lon = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        assert!(matches!(
            HostConfig::load("/definitely/not/here/station.toml"),
            Err(ConfigError::Read(_))
        ));

        let path = std::env::temp_dir().join(format!("station-{}.toml", std::process::id()));
        std::fs::write(&path, "[serial\npath = 3").unwrap();
        let result = HostConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
