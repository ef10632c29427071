//! Chunked firmware transfer
//!
//! The image is cut into fixed-size chunks, each sent as one frame on the
//! flashing id with the short tail zero-padded. Transport health and the
//! session fault flag are checked before every frame. Progress goes to
//! the bridge after each frame; a failed report never stops the transfer.

use std::sync::Arc;
use std::time::Duration;

use canflash_core::{
    BestEffort, Bridge, CanFrame, FlashPhase, FlashProgress, StatusCode, MAX_DATA_LEN,
};
use tokio::time::Instant;

use super::can_id;
use super::error::TransferError;
use super::firmware::FirmwareImage;
use crate::config::ProtocolConfig;
use crate::signal::SharedFlag;
use crate::transport::CanTransport;

/// Fill byte for the last, short chunk
const PAD_BYTE: u8 = 0x00;

/// What a finished transfer sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub frames_sent: u32,
    pub total_frames: u32,
    pub bytes: usize,
    pub elapsed: Duration,
}

/// Streams one firmware image to the unit
pub struct FlashTransfer {
    transport: Arc<dyn CanTransport>,
    bridge: Arc<dyn Bridge>,
    fault: SharedFlag,
    flashing: SharedFlag,
    chunk_size: usize,
    frame_delay: Duration,
}

impl FlashTransfer {
    pub fn new(
        transport: Arc<dyn CanTransport>,
        bridge: Arc<dyn Bridge>,
        fault: SharedFlag,
        flashing: SharedFlag,
        config: &ProtocolConfig,
    ) -> Self {
        Self {
            transport,
            bridge,
            fault,
            flashing,
            chunk_size: config.chunk_size,
            frame_delay: config.frame_delay(),
        }
    }

    /// Send every chunk of `image` in order
    ///
    /// The flashing flag is set for the duration. On abort the flag is
    /// cleared, the fault flag raised, and the bridge told to reset before
    /// [`TransferError::Aborted`] is returned.
    pub async fn run(&self, image: &FirmwareImage) -> Result<TransferSummary, TransferError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_DATA_LEN {
            return Err(TransferError::InvalidChunkSize(self.chunk_size));
        }
        if image.is_empty() {
            return Err(TransferError::EmptyImage);
        }

        let total = image.frame_count(self.chunk_size);
        let start = Instant::now();
        self.flashing.raise();
        tracing::info!(
            bytes = image.len(),
            frames = total,
            channel = %self.transport.channel(),
            "Starting firmware transfer"
        );

        let mut sent: u32 = 0;
        for chunk in image.as_bytes().chunks(self.chunk_size) {
            if let Err(reason) = self.check_link().await {
                return Err(self.abort(sent, total, reason).await);
            }

            let frame = CanFrame::padded(can_id::FLASH_DATA, chunk, PAD_BYTE)?;
            if let Err(e) = self.transport.send(&frame).await {
                return Err(self.abort(sent, total, format!("send failed: {}", e)).await);
            }
            sent += 1;

            let progress = FlashProgress::new(FlashPhase::Flashing, sent, total);
            tracing::debug!(frame = sent, total, percentage = progress.percentage, "Frame sent");
            self.bridge
                .report_flash_progress(&progress)
                .await
                .best_effort("report flash progress");

            if progress.is_complete() {
                tracing::info!(frames = sent, "Firmware transfer complete");
                self.bridge
                    .report_flash_progress(&FlashProgress::new(FlashPhase::Completed, sent, total))
                    .await
                    .best_effort("report flash completion");
            }

            if !self.frame_delay.is_zero() {
                tokio::time::sleep(self.frame_delay).await;
            }
        }

        self.flashing.clear();
        Ok(TransferSummary {
            frames_sent: sent,
            total_frames: total,
            bytes: image.len(),
            elapsed: start.elapsed(),
        })
    }

    /// Fault flag and adapter health, checked before every frame
    async fn check_link(&self) -> Result<(), String> {
        if self.fault.is_raised() {
            return Err("adapter fault raised".to_string());
        }
        match self.transport.health().await {
            Ok(status) if status.is_reachable() => Ok(()),
            Ok(status) => Err(format!("adapter {}", status)),
            Err(e) => Err(format!("health query failed: {}", e)),
        }
    }

    async fn abort(&self, frames_sent: u32, total: u32, reason: String) -> TransferError {
        tracing::error!(frames_sent, total, reason = %reason, "Firmware transfer aborted");

        self.flashing.clear();
        self.fault.raise();

        self.bridge
            .report_status(StatusCode::PcanFailed, &reason)
            .await
            .best_effort("report transfer abort");
        self.bridge
            .request_soft_reset()
            .await
            .best_effort("request soft reset");

        TransferError::Aborted {
            frames_sent,
            total,
            reason,
        }
    }
}
