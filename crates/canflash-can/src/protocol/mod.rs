//! Bootloader protocol
//!
//! Identifiers and payloads below are the bootloader's wire contract.

pub mod checksum;
pub mod error;
pub mod firmware;
pub mod handshake;
pub mod metadata;
pub mod transfer;
pub mod verify;

pub use checksum::ImageCrc;
pub use error::{ChecksumError, FirmwareError, HandshakeError, TransferError};
pub use firmware::FirmwareImage;
pub use handshake::{Handshake, HandshakeState, KeyExchangeOutcome};
pub use transfer::{FlashTransfer, TransferSummary};
pub use verify::CrcVerdict;

/// Fixed CAN identifiers used by the bootloader
pub mod can_id {
    use canflash_core::CanId;

    /// Bootloader status broadcasts; never a unit announcement
    pub const STATUS: u32 = 0x8;

    /// Security key, sent in standard format
    pub const KEY_EXCHANGE: CanId = CanId::standard(0x1444_4444);

    /// Key acknowledgement
    pub const KEY_ACK: u32 = 0x1222_2222;

    /// Metadata records after the key is accepted
    pub const METADATA: u32 = 0x1B00_0000;

    /// Firmware data, sent in standard format
    pub const FLASH_DATA: CanId = CanId::standard(0x5555_5555);

    /// Keep-alive ping
    pub const KEEP_ALIVE: CanId = CanId::extended(0x1999_9999);
}

/// First ack byte when the key is accepted
pub const ACK_ACCEPTED: u8 = 0x08;

/// First ack byte when the key is rejected
pub const ACK_REJECTED: u8 = 0x07;

/// Keep-alive ping payload
pub const KEEP_ALIVE_PAYLOAD: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
