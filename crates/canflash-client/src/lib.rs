//! Bridge client library
//!
//! HTTP implementation of [`canflash_core::Bridge`], the command/status
//! collaborator polled by the flashing daemon.
//!
//! # Example
//!
//! ```rust,no_run
//! use canflash_client::BridgeClient;
//! use canflash_core::{BestEffort, Bridge, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bridge = BridgeClient::new("http://localhost:5000")?;
//!
//!     let poll = bridge.poll_next_command().await?;
//!     println!("next directive: {:?}", poll.directive);
//!
//!     // Reports are best-effort
//!     bridge
//!         .report_status(StatusCode::PcanConnected, "")
//!         .await
//!         .best_effort("report status");
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module serves the bridge endpoints in-process:
//!
//! ```rust,ignore
//! use canflash_client::testing::TestBridge;
//!
//! let bridge = TestBridge::start().await?;
//! bridge.state.set_security_key(0x1234, vec![1, 2, 3, 4]);
//! ```

mod client;
mod config;
mod error;
pub mod testing;
mod types;

pub use client::BridgeClient;
pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use error::{ClientError, Result};
pub use types::*;
