//! Bridge trait - the command/status collaborator
//!
//! The bridge hands out directives, stores what the flasher learns about
//! the unit, and serves the firmware archive. Every call except
//! [`Bridge::fetch_firmware_archive`] is best-effort: protocol code must
//! keep going when the bridge is unreachable.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BridgeResult;
use crate::models::{FlashProgress, MetadataRecord, PollResult, StatusCode};

/// Command/status bridge used by the flashing session
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Fetch the next directive and the keep-alive flag
    async fn poll_next_command(&self) -> BridgeResult<PollResult>;

    /// Report a session status
    async fn report_status(&self, status: StatusCode, detail: &str) -> BridgeResult<()>;

    /// Report the id of a unit found by a scan
    async fn report_unit_id(&self, unit_id: u16) -> BridgeResult<()>;

    /// Fetch the security key for a unit, `None` when the bridge has none
    async fn fetch_security_key(&self, unit_id: u16) -> BridgeResult<Option<Vec<u8>>>;

    /// Report the metadata collected after a successful key exchange
    async fn report_unit_metadata(
        &self,
        unit_id: u16,
        records: &[MetadataRecord],
    ) -> BridgeResult<()>;

    /// Report transfer progress
    async fn report_flash_progress(&self, progress: &FlashProgress) -> BridgeResult<()>;

    /// Ask the bridge to return to idle while keeping unit information
    async fn request_soft_reset(&self) -> BridgeResult<()>;

    /// Download the firmware archive selected for a unit
    async fn fetch_firmware_archive(&self, unit_id: u16) -> BridgeResult<Bytes>;
}

/// Drop bridge failures from best-effort calls, logging them
pub trait BestEffort<T> {
    fn best_effort(self, operation: &str) -> Option<T>;
}

impl<T> BestEffort<T> for BridgeResult<T> {
    fn best_effort(self, operation: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) if e.is_unreachable() => {
                tracing::debug!(operation, error = %e, "Bridge unreachable, continuing");
                None
            }
            Err(e) => {
                tracing::warn!(operation, error = %e, "Bridge call failed, continuing");
                None
            }
        }
    }
}
