//! Firmware staging
//!
//! Fetches the unit's firmware archive from the bridge, keeps a copy in
//! the download directory, unpacks it to hex text and parses the image.

use std::path::{Path, PathBuf};

use canflash_can::{FirmwareError, FirmwareImage};
use canflash_core::{BestEffort, Bridge, BridgeError};
use thiserror::Error;

/// Staging errors
#[derive(Debug, Error)]
pub enum StagingError {
    /// The archive could not be fetched (missing, bridge down)
    #[error("Firmware download failed: {0}")]
    Download(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to unpack firmware archive: {0}")]
    Unpack(String),

    #[error("Invalid firmware: {0}")]
    Firmware(#[from] FirmwareError),
}

impl StagingError {
    /// Whether the failure happened before the archive was on disk
    pub fn is_download(&self) -> bool {
        matches!(self, Self::Download(_))
    }
}

/// Turns a downloaded archive into firmware hex text
pub trait FirmwareUnpacker: Send + Sync {
    fn unpack(&self, archive: &[u8]) -> Result<String, StagingError>;
}

/// Treats the archive as the hex text itself
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHexUnpacker;

impl FirmwareUnpacker for PlainHexUnpacker {
    fn unpack(&self, archive: &[u8]) -> Result<String, StagingError> {
        String::from_utf8(archive.to_vec())
            .map_err(|e| StagingError::Unpack(format!("archive is not text: {}", e)))
    }
}

/// Downloads and prepares firmware images
pub struct FirmwareStager {
    download_dir: PathBuf,
    unpacker: Box<dyn FirmwareUnpacker>,
}

impl FirmwareStager {
    pub fn new(download_dir: impl Into<PathBuf>, unpacker: Box<dyn FirmwareUnpacker>) -> Self {
        Self {
            download_dir: download_dir.into(),
            unpacker,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Where the archive for `unit_id` is stored
    pub fn archive_path(&self, unit_id: u16) -> PathBuf {
        self.download_dir.join(format!("received_{}.ergon", unit_id))
    }

    /// Fetch, store, unpack and parse the firmware for `unit_id`
    ///
    /// A soft reset is requested once the archive has been unpacked, so
    /// the bridge moves off the download directive.
    pub async fn stage(
        &self,
        bridge: &dyn Bridge,
        unit_id: u16,
    ) -> Result<FirmwareImage, StagingError> {
        let archive = bridge.fetch_firmware_archive(unit_id).await?;
        tracing::info!(
            unit_id = format!("0x{:04X}", unit_id),
            bytes = archive.len(),
            "Firmware archive received"
        );

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self.archive_path(unit_id);
        tokio::fs::write(&path, &archive).await?;
        tracing::debug!(path = %path.display(), "Firmware archive stored");

        let text = self.unpacker.unpack(&archive)?;
        bridge
            .request_soft_reset()
            .await
            .best_effort("request soft reset");

        let image = FirmwareImage::from_hex_text(&text)?;
        tracing::info!(bytes = image.len(), "Firmware image ready");
        Ok(image)
    }
}
