//! Shared session state
//!
//! One object shared by the command loop and the background tasks. Flags
//! are atomics; the unit, its identity and the transport handle sit behind
//! locks that are never held across an await.

use std::sync::Arc;

use canflash_can::{CanTransport, SharedFlag};
use canflash_core::{DeviceIdentity, MetadataRecord};
use parking_lot::RwLock;

/// State shared between the orchestrator and its background tasks
#[derive(Default)]
pub struct SessionState {
    /// Adapter lost; set by whoever notices, cleared only by a reconnect
    pub fault: SharedFlag,
    /// Keep-alive pings requested by the bridge
    pub keep_alive: SharedFlag,
    /// A firmware transfer is running
    pub flashing: SharedFlag,
    identity: RwLock<Option<DeviceIdentity>>,
    transport: RwLock<Option<Arc<dyn CanTransport>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current transport handle, if one is open
    pub fn transport(&self) -> Option<Arc<dyn CanTransport>> {
        self.transport.read().clone()
    }

    pub fn set_transport(&self, transport: Arc<dyn CanTransport>) {
        *self.transport.write() = Some(transport);
    }

    /// Remove the transport handle, returning it for closing
    pub fn take_transport(&self) -> Option<Arc<dyn CanTransport>> {
        self.transport.write().take()
    }

    /// Id of the last scanned unit
    pub fn unit_id(&self) -> Option<u16> {
        self.identity.read().as_ref().map(|identity| identity.unit_id)
    }

    /// Start tracking a newly scanned unit, discarding the previous one
    pub fn begin_unit(&self, unit_id: u16) {
        *self.identity.write() = Some(DeviceIdentity::new(unit_id));
    }

    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.identity.read().clone()
    }

    /// Record the accepted key and fold in the metadata that followed it
    pub fn record_handshake(&self, key: &[u8], records: &[MetadataRecord]) {
        if let Some(identity) = self.identity.write().as_mut() {
            identity.security_key = key.to_vec();
            for record in records {
                identity.apply(record);
            }
        }
    }
}
