//! Error types for bridge client construction and request mapping

use canflash_core::BridgeError;
use thiserror::Error;

/// Result type alias for client construction
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors building a [`crate::BridgeClient`]
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Map a transport-level reqwest failure onto the bridge taxonomy
///
/// Anything that kept the request from completing counts as unreachable.
pub(crate) fn request_error(e: reqwest::Error) -> BridgeError {
    if e.is_decode() {
        BridgeError::Parse(e.to_string())
    } else if let Some(status) = e.status() {
        BridgeError::server(status.as_u16(), e.to_string())
    } else {
        BridgeError::Unreachable(e.to_string())
    }
}
