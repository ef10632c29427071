//! Transport layer errors

use canflash_core::FrameError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// The adapter could not be opened
    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Connection closed")]
    ConnectionClosed,

    /// The adapter vanished (unplugged, interface removed)
    #[error("Hardware unreachable: {0}")]
    HardwareUnreachable(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport not supported: {0}")]
    Unsupported(String),

    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),
}
