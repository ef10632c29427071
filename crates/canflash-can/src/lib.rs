//! canflash-can - CAN transport and bootloader protocol driver
//!
//! This crate talks to the remote unit's bootloader over a raw CAN bus.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       protocol                              │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ Handshake   │  │FlashTransfer│  │ verify (post-flash) │  │
//! │  │ scan / key  │  │ chunk/pace  │  │ Calculated_CRC      │  │
//! │  └──────┬──────┘  └──────┬──────┘  └──────────┬──────────┘  │
//! │         │   metadata   checksum   firmware    │             │
//! │         └────────────────┬────────────────────┘             │
//! │                  ┌───────┴───────┐                          │
//! │                  │ CanTransport  │                          │
//! │                  │(SocketCAN/mock)│                         │
//! │                  └───────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod protocol;
pub mod signal;
pub mod transport;

pub use config::{ProtocolConfig, TransportConfig};
pub use protocol::{
    ChecksumError, CrcVerdict, FirmwareError, FirmwareImage, FlashTransfer, Handshake,
    HandshakeError, HandshakeState, ImageCrc, KeyExchangeOutcome, TransferError, TransferSummary,
};
pub use signal::SharedFlag;
pub use transport::{create_connector, BusStatus, CanTransport, TransportConnector, TransportError};

// Re-export for convenience
pub use canflash_core::{CanFrame, CanId, MetadataRecord, MetadataTag};
