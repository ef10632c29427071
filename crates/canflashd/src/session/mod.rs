//! Flashing session
//!
//! The orchestrator owns the command loop; the fault monitor, keep-alive
//! and flashing heartbeat run beside it and coordinate through
//! [`SessionState`].

mod heartbeat;
mod keepalive;
mod monitor;
mod orchestrator;
mod reconnect;
mod state;
mod tasks;

pub use heartbeat::run_heartbeat;
pub use keepalive::run_keep_alive;
pub use monitor::run_fault_monitor;
pub use orchestrator::{SessionOrchestrator, StepOutcome};
pub use reconnect::ReconnectManager;
pub use state::SessionState;
pub use tasks::BackgroundTasks;
