//! Daemon configuration
//!
//! One TOML file with a table per concern. Every field has a default, so
//! a missing table (or an empty file) gives the stock behavior.
//!
//! ```toml
//! [bridge]
//! base_url = "http://localhost:5000"
//!
//! [transport]
//! type = "socketcan"
//! interface = "can0"
//!
//! [protocol]
//! frame_delay_ms = 30
//! verify_crc = true
//!
//! [session]
//! keepalive_interval_ms = 500
//!
//! [firmware]
//! download_dir = "temp_firmware"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use canflash_can::{ProtocolConfig, TransportConfig};
use canflash_client::BridgeConfig;
use serde::{Deserialize, Serialize};

/// Complete daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub firmware: FirmwareConfig,
}

impl DaemonConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Command loop and background task timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Pause between bridge polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Fault monitor health-poll interval
    #[serde(default = "default_health_interval")]
    pub health_interval_ms: u64,
    /// Pause between reconnect attempts
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Keep-alive ping interval
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_ms: u64,
    /// "Still connected" report interval while flashing
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Log every Nth consecutive poll without a directive
    #[serde(default = "default_idle_log_every")]
    pub idle_log_every: u32,
    /// Pause on `wait_for_firmware`
    #[serde(default = "default_wait_for_firmware")]
    pub wait_for_firmware_ms: u64,
    /// Pause after a completed flash before polling again
    #[serde(default = "default_post_flash_cooldown")]
    pub post_flash_cooldown_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            health_interval_ms: default_health_interval(),
            reconnect_delay_ms: default_reconnect_delay(),
            keepalive_interval_ms: default_keepalive_interval(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            idle_log_every: default_idle_log_every(),
            wait_for_firmware_ms: default_wait_for_firmware(),
            post_flash_cooldown_ms: default_post_flash_cooldown(),
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn wait_for_firmware(&self) -> Duration {
        Duration::from_millis(self.wait_for_firmware_ms)
    }

    pub fn post_flash_cooldown(&self) -> Duration {
        Duration::from_millis(self.post_flash_cooldown_ms)
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_health_interval() -> u64 {
    1000
}

fn default_reconnect_delay() -> u64 {
    2000
}

fn default_keepalive_interval() -> u64 {
    500
}

fn default_heartbeat_interval() -> u64 {
    2000
}

fn default_idle_log_every() -> u32 {
    30
}

fn default_wait_for_firmware() -> u64 {
    2000
}

fn default_post_flash_cooldown() -> u64 {
    3000
}

/// Firmware staging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareConfig {
    /// Where downloaded archives are kept
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("temp_firmware")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
