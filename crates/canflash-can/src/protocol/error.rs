//! Protocol errors

use canflash_core::FrameError;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors walking the block structure of a firmware image
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("Firmware image too short for a block header: {0} bytes")]
    TooShort(usize),

    /// A block declares more data than the image holds
    #[error("Block at offset {offset} declares {words} words but the image ends at {len}")]
    TruncatedBlock { offset: usize, words: u16, len: usize },
}

/// Errors turning firmware text into an image
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FirmwareError {
    #[error("Firmware text has an odd number of hex digits ({0})")]
    OddLength(usize),

    #[error("Firmware text contains no data")]
    Empty,
}

#[derive(Debug, Error, Clone)]
pub enum HandshakeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Security key is {0} bytes, a single frame holds 8")]
    KeyTooLong(usize),

    /// The session fault flag was raised before the exchange could send
    #[error("Adapter fault raised, handshake not started")]
    Fault,
}

#[derive(Debug, Error, Clone)]
pub enum TransferError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Firmware image is empty")]
    EmptyImage,

    #[error("Chunk size must be between 1 and 8, got {0}")]
    InvalidChunkSize(usize),

    /// Transfer stopped part way; cleanup has already run
    #[error("Transfer aborted after {frames_sent}/{total} frames: {reason}")]
    Aborted {
        frames_sent: u32,
        total: u32,
        reason: String,
    },
}
