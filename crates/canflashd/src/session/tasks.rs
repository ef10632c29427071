//! Generation-tagged background tasks
//!
//! The fault monitor and keep-alive are bound to one transport. Every
//! reconnect bumps the generation, aborting the previous pair before the
//! next one is spawned, so no task outlives the transport it was given.

use std::sync::Arc;

use canflash_can::CanTransport;
use canflash_core::Bridge;
use tokio::task::JoinHandle;

use super::keepalive::run_keep_alive;
use super::monitor::run_fault_monitor;
use super::SessionState;
use crate::config::SessionConfig;

pub struct BackgroundTasks {
    bridge: Arc<dyn Bridge>,
    config: SessionConfig,
    generation: u64,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn new(bridge: Arc<dyn Bridge>, config: &SessionConfig) -> Self {
        Self {
            bridge,
            config: config.clone(),
            generation: 0,
            handles: Vec::new(),
        }
    }

    /// Generation of the running tasks; 0 before the first start
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether any task of the current generation is still running
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|handle| !handle.is_finished())
    }

    /// Retire the current generation and start a new one on `transport`
    pub fn restart(&mut self, transport: Arc<dyn CanTransport>, state: &Arc<SessionState>) -> u64 {
        self.stop();
        self.generation += 1;

        self.handles.push(tokio::spawn(run_fault_monitor(
            transport.clone(),
            state.clone(),
            self.bridge.clone(),
            self.config.health_interval(),
        )));
        self.handles.push(tokio::spawn(run_keep_alive(
            transport,
            state.clone(),
            self.config.keepalive_interval(),
        )));

        tracing::debug!(generation = self.generation, "Background tasks started");
        self.generation
    }

    /// Abort every task of the current generation
    pub fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        tracing::debug!(generation = self.generation, "Background tasks stopped");
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
