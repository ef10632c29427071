//! Connected-status heartbeat while flashing

use std::sync::Arc;
use std::time::Duration;

use canflash_core::{BestEffort, Bridge, StatusCode};

use super::SessionState;

/// Report `pcan_connected` every `interval` until the flashing flag drops
pub async fn run_heartbeat(state: Arc<SessionState>, bridge: Arc<dyn Bridge>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        if !state.flashing.is_raised() {
            tracing::debug!("Flashing finished, heartbeat stopped");
            return;
        }
        bridge
            .report_status(StatusCode::PcanConnected, "flashing")
            .await
            .best_effort("report heartbeat");
    }
}
