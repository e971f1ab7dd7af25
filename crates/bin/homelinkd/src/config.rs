//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homelink.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use homelink_app::sync_engine::SyncConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport selection.
    pub transport: TransportConfig,
    /// Direct-device transport settings.
    pub device: DeviceConfig,
    /// Cloud KV transport settings.
    pub cloud: CloudConfig,
    /// Synchronisation timing and thresholds.
    pub sync: SyncSection,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Which back-end carries device state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Talk to the controller's HTTP endpoint on the local network.
    Device,
    /// Go through the hosted realtime KV store.
    #[default]
    Cloud,
}

/// Transport selection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Back-end to use (`device` or `cloud`).
    pub mode: TransportMode,
}

/// Direct-device transport settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Controller address (IPv4 or hostname, no scheme). Falls back to the
    /// persisted value from a previous run when empty.
    pub host: String,
    /// Monitoring poll interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
}

/// Cloud KV transport settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Base URL of the realtime KV database.
    pub database_url: String,
    /// Optional auth key appended to every request.
    pub api_key: Option<String>,
    /// Delay before re-opening a dropped stream, in milliseconds.
    pub reconnect_delay_ms: u64,
}

/// Synchronisation timing and thresholds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Hard deadline for a single write, in milliseconds.
    pub write_timeout_ms: u64,
    /// Interval without fresh data after which the link is declared offline,
    /// in milliseconds.
    pub staleness_ms: u64,
    /// Pace of reconnection pings while offline, in milliseconds.
    pub ping_interval_ms: u64,
    /// Ampere threshold for the high-current alert (strict `>`).
    pub current_threshold: f64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `homelink.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("homelink.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMELINK_TRANSPORT") {
            match val.to_ascii_lowercase().as_str() {
                "device" => self.transport.mode = TransportMode::Device,
                "cloud" => self.transport.mode = TransportMode::Cloud,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("HOMELINK_DEVICE_HOST") {
            self.device.host = val;
        }
        if let Ok(val) = std::env::var("HOMELINK_CLOUD_URL") {
            self.cloud.database_url = val;
        }
        if let Ok(val) = std::env::var("HOMELINK_CLOUD_API_KEY") {
            self.cloud.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("HOMELINK_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.mode == TransportMode::Cloud && self.cloud.database_url.is_empty() {
            return Err(ConfigError::Validation(
                "cloud transport requires cloud.database_url".to_string(),
            ));
        }
        if self.sync.write_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "sync.write_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.sync.staleness_ms == 0 {
            return Err(ConfigError::Validation(
                "sync.staleness_ms must be non-zero".to_string(),
            ));
        }
        if !self.sync.current_threshold.is_finite() || self.sync.current_threshold < 0.0 {
            return Err(ConfigError::Validation(
                "sync.current_threshold must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// Timing knobs in the form the sync engine takes them.
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            write_timeout: Duration::from_millis(self.sync.write_timeout_ms),
            staleness: Duration::from_millis(self.sync.staleness_ms),
            ping_interval: Duration::from_millis(self.sync.ping_interval_ms),
            current_threshold: self.sync.current_threshold,
        }
    }

    /// Monitoring poll interval for the direct transport.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.device.poll_interval_ms.unwrap_or(1_000))
    }

    /// Reconnect delay for the cloud transport.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.cloud.reconnect_delay_ms)
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            api_key: None,
            reconnect_delay_ms: 2_000,
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            write_timeout_ms: 5_000,
            staleness_ms: 10_000,
            ping_interval_ms: 5_000,
            current_threshold: 5.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homelinkd=info,homelink=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
