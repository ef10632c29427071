//! Firmware image parsing

use super::checksum::ImageCrc;
use super::error::{ChecksumError, FirmwareError};

/// Start-of-text marker wrapping some firmware text files
const FRAME_START: &str = "02";
/// End-of-text marker
const FRAME_END: &str = "03";

/// Firmware bytes ready to be flashed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    bytes: Vec<u8>,
}

impl FirmwareImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Parse hex firmware text
    ///
    /// Every non-hex character is dropped first (whitespace, line breaks,
    /// separators). A leading `02` and trailing `03` pair is stripped.
    pub fn from_hex_text(text: &str) -> Result<Self, FirmwareError> {
        let cleaned: String = text.chars().filter(char::is_ascii_hexdigit).collect();

        let body = if cleaned.len() >= 4
            && cleaned.starts_with(FRAME_START)
            && cleaned.ends_with(FRAME_END)
        {
            &cleaned[FRAME_START.len()..cleaned.len() - FRAME_END.len()]
        } else {
            cleaned.as_str()
        };

        if body.is_empty() {
            return Err(FirmwareError::Empty);
        }
        if body.len() % 2 != 0 {
            return Err(FirmwareError::OddLength(body.len()));
        }

        let bytes = hex::decode(body).map_err(|_| FirmwareError::OddLength(body.len()))?;
        tracing::debug!(bytes = bytes.len(), "Parsed firmware text");
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Frames needed to send the image in `chunk_size` pieces
    pub fn frame_count(&self, chunk_size: usize) -> u32 {
        if chunk_size == 0 {
            return 0;
        }
        self.bytes.len().div_ceil(chunk_size) as u32
    }

    pub fn crc(&self) -> Result<ImageCrc, ChecksumError> {
        ImageCrc::compute(&self.bytes)
    }
}
