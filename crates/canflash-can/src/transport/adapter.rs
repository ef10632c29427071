//! Transport adapter traits and types

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canflash_core::CanFrame;

use super::TransportError;

/// Adapter health as seen by the fault monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusStatus {
    /// Adapter present and usable
    Ok,
    /// Adapter present but not in a clean state (bus-off, interface down)
    Degraded(String),
    /// Adapter gone; only a reopen can recover
    HardwareUnreachable,
}

impl BusStatus {
    /// False only when the hardware itself is gone
    pub fn is_reachable(&self) -> bool {
        !matches!(self, Self::HardwareUnreachable)
    }
}

impl fmt::Display for BusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Degraded(reason) => write!(f, "degraded ({})", reason),
            Self::HardwareUnreachable => write!(f, "hardware unreachable"),
        }
    }
}

/// Raw CAN frame transport
///
/// Sends are serialized by the adapter, so the keep-alive task and a
/// running transfer can share one instance.
#[async_trait]
pub trait CanTransport: Send + Sync {
    /// Send one frame
    async fn send(&self, frame: &CanFrame) -> Result<(), TransportError>;

    /// Wait up to `timeout` for a frame
    ///
    /// With `expected_id` set, frames with any other raw identifier are
    /// discarded and waiting continues until the deadline. Returns
    /// `Ok(None)` when the deadline passes.
    async fn receive(
        &self,
        expected_id: Option<u32>,
        timeout: Duration,
    ) -> Result<Option<CanFrame>, TransportError>;

    /// Query adapter health
    async fn health(&self) -> Result<BusStatus, TransportError>;

    /// Release the adapter. Later calls fail with `ConnectionClosed`.
    async fn close(&self);

    /// Human-readable channel name for logs
    fn channel(&self) -> String;
}

/// Opens fresh transports, at startup and on every reconnect
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn CanTransport>, TransportError>;
}
