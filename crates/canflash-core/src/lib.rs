//! canflash-core - Core types for the CAN bootloader flasher
//!
//! This crate holds the types shared by the protocol driver, the bridge
//! client and the daemon:
//!
//! - CAN identifiers and frames ([`CanId`], [`CanFrame`])
//! - Device metadata ([`MetadataTag`], [`MetadataRecord`], [`DeviceIdentity`])
//! - Bridge directives, status codes and flash progress
//! - The [`Bridge`] trait, the command/status collaborator the daemon polls
//!
//! The `testing` module provides [`testing::RecordingBridge`], an in-memory
//! bridge for protocol and session tests.

pub mod bridge;
pub mod error;
pub mod models;
pub mod testing;

pub use bridge::{BestEffort, Bridge};
pub use error::{BridgeError, BridgeResult, FrameError};
pub use models::*;
