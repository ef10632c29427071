//! Bridge client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bridge connection settings
///
/// Loaded from the daemon's `[bridge]` table or built programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the bridge
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout in milliseconds (default: 5s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Connect timeout in milliseconds (default: 2s)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Firmware download timeout in milliseconds (default: 60s)
    #[serde(default = "default_download_timeout")]
    pub download_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            download_timeout_ms: default_download_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout() -> u64 {
    5_000
}

fn default_connect_timeout() -> u64 {
    2_000
}

fn default_download_timeout() -> u64 {
    60_000
}

impl BridgeConfig {
    /// Create a builder for programmatic configuration
    pub fn builder(base_url: impl Into<String>) -> BridgeConfigBuilder {
        BridgeConfigBuilder::new(base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }
}

/// Builder for [`BridgeConfig`]
#[derive(Debug, Clone)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Create a new builder with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: BridgeConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
        }
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the firmware download timeout
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.config.download_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: BridgeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::builder("http://bridge:8080")
            .request_timeout(Duration::from_millis(750))
            .connect_timeout(Duration::from_millis(250))
            .build();

        assert_eq!(config.base_url, "http://bridge:8080");
        assert_eq!(config.request_timeout_ms, 750);
        assert_eq!(config.connect_timeout_ms, 250);
        assert_eq!(config.download_timeout_ms, 60_000);
    }
}
