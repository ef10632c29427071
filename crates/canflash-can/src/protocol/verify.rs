//! Post-flash CRC verification
//!
//! After the last frame the bootloader reports the CRC it computed over
//! the received image as a `Calculated_CRC` metadata record.

use std::time::Duration;

use canflash_core::{MetadataTag, StatusCode};
use tokio::time::Instant;

use super::{can_id, metadata};
use crate::transport::{CanTransport, TransportError};

/// Outcome of comparing the unit's CRC with ours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcVerdict {
    Verified { crc: u16 },
    Mismatch { expected: u16, reported: u16 },
    /// The unit sent no `Calculated_CRC` within the window
    Unverified { expected: u16 },
}

impl CrcVerdict {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Verified { .. } => StatusCode::CrcVerified,
            Self::Mismatch { .. } => StatusCode::CrcMismatch,
            Self::Unverified { .. } => StatusCode::CrcUnverified,
        }
    }

    /// Detail string for the status report
    pub fn detail(&self) -> String {
        match self {
            Self::Verified { crc } => format!("crc=0x{:04X}", crc),
            Self::Mismatch { expected, reported } => {
                format!("expected=0x{:04X} got=0x{:04X}", expected, reported)
            }
            Self::Unverified { expected } => format!("expected=0x{:04X}", expected),
        }
    }
}

/// Wait up to `window` for the unit's `Calculated_CRC` and compare it
///
/// Other metadata records arriving in the window are skipped.
pub async fn verify_crc(
    transport: &dyn CanTransport,
    expected: u16,
    window: Duration,
) -> Result<CrcVerdict, TransportError> {
    let deadline = Instant::now() + window;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let Some(frame) = transport.receive(Some(can_id::METADATA), remaining).await? else {
            break;
        };

        let record = metadata::decode(&frame);
        if record.kind() == Some(MetadataTag::CalculatedCrc) {
            let reported = record.value as u16;
            let verdict = if reported == expected {
                CrcVerdict::Verified { crc: reported }
            } else {
                CrcVerdict::Mismatch { expected, reported }
            };
            tracing::info!(?verdict, "CRC verification finished");
            return Ok(verdict);
        }
    }

    tracing::warn!(
        expected = format!("0x{:04X}", expected),
        "No Calculated_CRC reported"
    );
    Ok(CrcVerdict::Unverified { expected })
}
