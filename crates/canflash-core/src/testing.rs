//! Testing utilities
//!
//! [`RecordingBridge`] is an in-memory [`Bridge`] that hands out scripted
//! directives and records every report, so protocol and session code can
//! be tested without a bridge server.
//!
//! ```ignore
//! use canflash_core::testing::{BridgeCall, RecordingBridge};
//!
//! let bridge = Arc::new(RecordingBridge::new());
//! bridge.push_directive("scan_unit", true);
//! // ... run the session ...
//! assert!(bridge.calls().contains(&BridgeCall::UnitId(0x1234)));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::models::{Directive, FlashProgress, MetadataRecord, PollResult, StatusCode};

/// One call observed by [`RecordingBridge`]
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    Poll,
    Status(StatusCode, String),
    UnitId(u16),
    KeyRequest(u16),
    Metadata(u16, Vec<MetadataRecord>),
    Progress(FlashProgress),
    SoftReset,
    FirmwareRequest(u16),
}

/// In-memory bridge for tests
#[derive(Default)]
pub struct RecordingBridge {
    polls: RwLock<VecDeque<PollResult>>,
    idle_keep_alive: AtomicBool,
    keys: RwLock<HashMap<u16, Vec<u8>>>,
    firmware: RwLock<HashMap<u16, Bytes>>,
    unreachable: AtomicBool,
    calls: RwLock<Vec<BridgeCall>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a directive for a later poll
    pub fn push_directive(&self, command: &str, keep_alive: bool) {
        self.polls.write().push_back(PollResult {
            directive: Some(Directive::parse(command)),
            keep_alive,
        });
    }

    /// Queue a poll result carrying no directive
    pub fn push_idle(&self, keep_alive: bool) {
        self.polls.write().push_back(PollResult {
            directive: None,
            keep_alive,
        });
    }

    /// Keep-alive flag returned once the script is exhausted
    pub fn set_idle_keep_alive(&self, keep_alive: bool) {
        self.idle_keep_alive.store(keep_alive, Ordering::SeqCst);
    }

    pub fn set_security_key(&self, unit_id: u16, key: Vec<u8>) {
        self.keys.write().insert(unit_id, key);
    }

    pub fn set_firmware(&self, unit_id: u16, archive: impl Into<Bytes>) {
        self.firmware.write().insert(unit_id, archive.into());
    }

    /// Make every call fail as if the bridge were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BridgeCall> {
        self.calls.read().clone()
    }

    /// Reported statuses, in order
    pub fn statuses(&self) -> Vec<StatusCode> {
        self.calls
            .read()
            .iter()
            .filter_map(|call| match call {
                BridgeCall::Status(status, _) => Some(*status),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<FlashProgress> {
        self.calls
            .read()
            .iter()
            .filter_map(|call| match call {
                BridgeCall::Progress(progress) => Some(*progress),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&BridgeCall) -> bool) -> usize {
        self.calls.read().iter().filter(|call| matches(call)).count()
    }

    /// Number of polls still scripted
    pub fn pending_polls(&self) -> usize {
        self.polls.read().len()
    }

    fn record(&self, call: BridgeCall) -> BridgeResult<()> {
        self.calls.write().push(call);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(BridgeError::Unreachable("recording bridge offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Bridge for RecordingBridge {
    async fn poll_next_command(&self) -> BridgeResult<PollResult> {
        self.record(BridgeCall::Poll)?;
        let next = self.polls.write().pop_front();
        Ok(next.unwrap_or(PollResult {
            directive: None,
            keep_alive: self.idle_keep_alive.load(Ordering::SeqCst),
        }))
    }

    async fn report_status(&self, status: StatusCode, detail: &str) -> BridgeResult<()> {
        self.record(BridgeCall::Status(status, detail.to_string()))
    }

    async fn report_unit_id(&self, unit_id: u16) -> BridgeResult<()> {
        self.record(BridgeCall::UnitId(unit_id))
    }

    async fn fetch_security_key(&self, unit_id: u16) -> BridgeResult<Option<Vec<u8>>> {
        self.record(BridgeCall::KeyRequest(unit_id))?;
        Ok(self.keys.read().get(&unit_id).cloned())
    }

    async fn report_unit_metadata(
        &self,
        unit_id: u16,
        records: &[MetadataRecord],
    ) -> BridgeResult<()> {
        self.record(BridgeCall::Metadata(unit_id, records.to_vec()))
    }

    async fn report_flash_progress(&self, progress: &FlashProgress) -> BridgeResult<()> {
        self.record(BridgeCall::Progress(*progress))
    }

    async fn request_soft_reset(&self) -> BridgeResult<()> {
        self.record(BridgeCall::SoftReset)
    }

    async fn fetch_firmware_archive(&self, unit_id: u16) -> BridgeResult<Bytes> {
        self.record(BridgeCall::FirmwareRequest(unit_id))?;
        self.firmware
            .read()
            .get(&unit_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("firmware for unit 0x{:04X}", unit_id)))
    }
}
