//! canflashd - CAN bootloader flashing daemon
//!
//! Polls the command/status bridge and drives the remote unit's
//! bootloader: scan, security-key exchange, firmware staging and the
//! chunked transfer. An adapter fault never ends the process; the session
//! reconnects and carries on.
//!
//! ```text
//!  bridge ──poll──► SessionOrchestrator ──► Handshake / FlashTransfer
//!                        │    ▲                     │
//!                        │    └── ReconnectManager  ▼
//!                        │            ▲        CanTransport
//!                        ▼            │         ▲       ▲
//!                   SessionState ◄── fault ── monitor  keep-alive
//! ```

pub mod config;
pub mod session;
pub mod staging;

pub use config::{ConfigError, DaemonConfig, FirmwareConfig, SessionConfig};
pub use session::{SessionOrchestrator, SessionState, StepOutcome};
pub use staging::{FirmwareStager, FirmwareUnpacker, PlainHexUnpacker, StagingError};
