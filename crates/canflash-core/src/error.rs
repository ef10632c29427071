//! Common error types

use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors returned by the command/status bridge
///
/// `Unreachable` covers connection failures and timeouts. Best-effort
/// callers log and drop it; the firmware fetch is the only call whose
/// failure aborts protocol work.
#[derive(Debug, Error, Clone)]
pub enum BridgeError {
    /// Bridge could not be reached (connect error, timeout)
    #[error("Bridge unreachable: {0}")]
    Unreachable(String),

    /// Requested resource does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bridge answered with a non-success status
    #[error("Bridge error {status}: {message}")]
    Server { status: u16, message: String },

    /// Bridge answered with a body we could not interpret
    #[error("Failed to parse bridge response: {0}")]
    Parse(String),
}

impl BridgeError {
    /// Create a server error from status code and message
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Whether the bridge itself was unreachable
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Errors building a CAN frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("CAN payload too long: {0} bytes (max 8)")]
    TooLong(usize),
}
