//! Bridge directives and status codes

use std::fmt;

use serde::{Deserialize, Serialize};

/// Next action handed out by the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    ScanUnit,
    Idle,
    SendSecurityKey,
    DownloadFirmware,
    WaitForFirmware,
    Shutdown,
    /// Anything the daemon does not know; logged and ignored
    Other(String),
}

impl Directive {
    pub fn parse(command: &str) -> Self {
        match command {
            "scan_unit" => Self::ScanUnit,
            "idle" => Self::Idle,
            "send_security_key" => Self::SendSecurityKey,
            "download_firmware" => Self::DownloadFirmware,
            "wait_for_firmware" => Self::WaitForFirmware,
            "shutdown" => Self::Shutdown,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ScanUnit => "scan_unit",
            Self::Idle => "idle",
            Self::SendSecurityKey => "send_security_key",
            Self::DownloadFirmware => "download_firmware",
            Self::WaitForFirmware => "wait_for_firmware",
            Self::Shutdown => "shutdown",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one bridge poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollResult {
    pub directive: Option<Directive>,
    /// Whether keep-alive pings should be sent
    pub keep_alive: bool,
}

/// Status values reported to the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    PcanConnected,
    PcanFailed,
    UnitNotFound,
    HandshakeFailed,
    FirmwareDownloadFailed,
    FirmwareInvalid,
    CrcVerified,
    CrcMismatch,
    CrcUnverified,
}

impl StatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PcanConnected => "pcan_connected",
            Self::PcanFailed => "pcan_failed",
            Self::UnitNotFound => "unit_not_found",
            Self::HandshakeFailed => "handshake_failed",
            Self::FirmwareDownloadFailed => "firmware_download_failed",
            Self::FirmwareInvalid => "firmware_invalid",
            Self::CrcVerified => "crc_verified",
            Self::CrcMismatch => "crc_mismatch",
            Self::CrcUnverified => "crc_unverified",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
