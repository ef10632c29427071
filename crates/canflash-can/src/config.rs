//! Transport and protocol configuration
//!
//! Every field has a serde default, so an empty TOML table gives the stock
//! bootloader timings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Transport Configuration
// =============================================================================

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Raw SocketCAN (Linux only)
    SocketCan(SocketCanConfig),
    /// Mock transport for testing
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::SocketCan(SocketCanConfig::default())
    }
}

/// SocketCAN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketCanConfig {
    /// CAN interface name (e.g., "can0")
    #[serde(default = "default_interface")]
    pub interface: String,
    /// CAN bus bitrate. The interface is configured outside this process;
    /// the value is logged so mismatches are easy to spot.
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
    /// Capacity of the received-frame queue
    #[serde(default = "default_rx_queue")]
    pub rx_queue: usize,
}

impl Default for SocketCanConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            bitrate: default_bitrate(),
            rx_queue: default_rx_queue(),
        }
    }
}

fn default_interface() -> String {
    "can0".to_string()
}

fn default_bitrate() -> u32 {
    500000
}

fn default_rx_queue() -> usize {
    1024
}

/// Mock transport configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockConfig {
    /// Simulated latency in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
}

// =============================================================================
// Protocol Configuration
// =============================================================================

/// Bootloader protocol timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// How long a scan listens for a unit
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_ms: u64,
    /// How long to wait for the key acknowledgement
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_ms: u64,
    /// Total key-exchange attempts
    #[serde(default = "default_key_attempts")]
    pub key_attempts: u32,
    /// Pause between key-exchange attempts
    #[serde(default = "default_key_retry_delay")]
    pub key_retry_delay_ms: u64,
    /// Metadata collection window after the key is accepted
    #[serde(default = "default_metadata_window")]
    pub metadata_window_ms: u64,
    /// Firmware bytes per flashing frame
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause after each flashing frame
    #[serde(default = "default_frame_delay")]
    pub frame_delay_ms: u64,
    /// Compare the computed CRC with the unit's Calculated_CRC after flashing
    #[serde(default)]
    pub verify_crc: bool,
    /// How long to wait for the unit's Calculated_CRC
    #[serde(default = "default_verify_window")]
    pub verify_window_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            scan_timeout_ms: default_scan_timeout(),
            ack_timeout_ms: default_ack_timeout(),
            key_attempts: default_key_attempts(),
            key_retry_delay_ms: default_key_retry_delay(),
            metadata_window_ms: default_metadata_window(),
            chunk_size: default_chunk_size(),
            frame_delay_ms: default_frame_delay(),
            verify_crc: false,
            verify_window_ms: default_verify_window(),
        }
    }
}

impl ProtocolConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn key_retry_delay(&self) -> Duration {
        Duration::from_millis(self.key_retry_delay_ms)
    }

    pub fn metadata_window(&self) -> Duration {
        Duration::from_millis(self.metadata_window_ms)
    }

    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    pub fn verify_window(&self) -> Duration {
        Duration::from_millis(self.verify_window_ms)
    }
}

fn default_scan_timeout() -> u64 {
    5000
}

fn default_ack_timeout() -> u64 {
    2000
}

fn default_key_attempts() -> u32 {
    3
}

fn default_key_retry_delay() -> u64 {
    1000
}

fn default_metadata_window() -> u64 {
    2000
}

fn default_chunk_size() -> usize {
    8
}

fn default_frame_delay() -> u64 {
    30
}

fn default_verify_window() -> u64 {
    2000
}
