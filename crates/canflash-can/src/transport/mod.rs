//! Transport layer for raw CAN communication
//!
//! This module provides transport adapters for talking to the bootloader:
//! - SocketCAN adapter for raw CAN frames (Linux only)
//! - Mock adapter for testing
//!
//! # Example
//!
//! ```ignore
//! use canflash_can::transport::{create_connector, CanTransport};
//! use canflash_can::config::TransportConfig;
//!
//! let connector = create_connector(&TransportConfig::Mock(Default::default()))?;
//! let transport = connector.open().await?;
//! let ack = transport.receive(Some(0x1222_2222), Duration::from_secs(2)).await?;
//! ```

mod adapter;
pub mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use adapter::{BusStatus, CanTransport, TransportConnector};
pub use error::TransportError;

use std::sync::Arc;

use crate::config::TransportConfig;

/// Create a transport connector based on configuration
pub fn create_connector(
    config: &TransportConfig,
) -> Result<Arc<dyn TransportConnector>, TransportError> {
    match config {
        #[cfg(all(target_os = "linux", feature = "socketcan"))]
        TransportConfig::SocketCan(cfg) => Ok(Arc::new(socketcan::SocketCanConnector::new(cfg))),
        #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
        TransportConfig::SocketCan(_) => Err(TransportError::Unsupported(
            "SocketCAN requires Linux and the 'socketcan' feature".to_string(),
        )),
        TransportConfig::Mock(cfg) => Ok(Arc::new(mock::MockConnector::new(cfg))),
    }
}
