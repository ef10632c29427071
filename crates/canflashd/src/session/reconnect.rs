//! Adapter reconnection
//!
//! Runs while the fault flag is raised: close whatever transport is left,
//! open a fresh one and hand it back once it reports a reachable bus.
//! There is no attempt limit.

use std::sync::Arc;
use std::time::Duration;

use canflash_can::TransportConnector;
use canflash_core::{BestEffort, Bridge, StatusCode};

use super::{BackgroundTasks, SessionState};

pub struct ReconnectManager {
    connector: Arc<dyn TransportConnector>,
    bridge: Arc<dyn Bridge>,
    delay: Duration,
}

impl ReconnectManager {
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        bridge: Arc<dyn Bridge>,
        delay: Duration,
    ) -> Self {
        Self {
            connector,
            bridge,
            delay,
        }
    }

    /// Reopen the adapter, retrying until it succeeds
    ///
    /// On return the fault flag is clear, the new transport is installed
    /// in `state` and `tasks` runs a fresh generation against it. Returns
    /// the number of attempts taken.
    pub async fn reconnect(&self, state: &Arc<SessionState>, tasks: &mut BackgroundTasks) -> u32 {
        tasks.stop();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if let Some(old) = state.take_transport() {
                tracing::debug!(channel = %old.channel(), "Closing faulted transport");
                old.close().await;
            }

            let failure = match self.connector.open().await {
                Ok(transport) => match transport.health().await {
                    Ok(status) if status.is_reachable() => {
                        let channel = transport.channel();
                        state.set_transport(transport.clone());
                        state.fault.clear();
                        tracing::info!(attempt, channel = %channel, "CAN adapter reconnected");

                        self.bridge
                            .report_status(
                                StatusCode::PcanConnected,
                                &format!("reconnected on {} after {} attempts", channel, attempt),
                            )
                            .await
                            .best_effort("report reconnect");
                        tasks.restart(transport, state);
                        return attempt;
                    }
                    Ok(status) => {
                        transport.close().await;
                        format!("adapter opened but {}", status)
                    }
                    Err(e) => {
                        transport.close().await;
                        format!("health query failed: {}", e)
                    }
                },
                Err(e) => e.to_string(),
            };

            tracing::warn!(attempt, reason = %failure, "Reconnect attempt failed");
            self.bridge
                .report_status(StatusCode::PcanFailed, &failure)
                .await
                .best_effort("report reconnect failure");
            tokio::time::sleep(self.delay).await;
        }
    }
}
