//! Fault monitor
//!
//! Polls adapter health. The first unreachable status (or failed health
//! query) raises the fault flag, reports `pcan_failed` and ends the task;
//! a new monitor is started after the reconnect.

use std::sync::Arc;
use std::time::Duration;

use canflash_can::CanTransport;
use canflash_core::{BestEffort, Bridge, StatusCode};
use tokio::time::MissedTickBehavior;

use super::SessionState;

pub async fn run_fault_monitor(
    transport: Arc<dyn CanTransport>,
    state: Arc<SessionState>,
    bridge: Arc<dyn Bridge>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let reason = match transport.health().await {
            Ok(status) if status.is_reachable() => {
                tracing::trace!(%status, "Adapter healthy");
                continue;
            }
            Ok(status) => status.to_string(),
            Err(e) => format!("health query failed: {}", e),
        };

        let already_raised = state.fault.raise();
        tracing::error!(
            channel = %transport.channel(),
            reason = %reason,
            "CAN adapter fault detected"
        );
        if !already_raised {
            bridge
                .report_status(StatusCode::PcanFailed, &reason)
                .await
                .best_effort("report adapter fault");
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canflash_can::transport::mock::MockCanTransport;
    use canflash_can::BusStatus;
    use canflash_core::testing::RecordingBridge;

    fn setup() -> (Arc<MockCanTransport>, Arc<SessionState>, Arc<RecordingBridge>) {
        (
            Arc::new(MockCanTransport::new(&Default::default())),
            Arc::new(SessionState::new()),
            Arc::new(RecordingBridge::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_raises_fault_once_and_stops() {
        let (transport, state, bridge) = setup();
        let handle = tokio::spawn(run_fault_monitor(
            transport.clone(),
            state.clone(),
            bridge.clone(),
            Duration::from_secs(1),
        ));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(!state.fault.is_raised());

        transport.set_health(BusStatus::HardwareUnreachable);
        handle.await.unwrap();

        assert!(state.fault.is_raised());
        assert_eq!(bridge.statuses(), vec![StatusCode::PcanFailed]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_error_counts_as_unreachable() {
        let (transport, state, bridge) = setup();
        transport.set_fail_health(true);

        run_fault_monitor(transport, state.clone(), bridge, Duration::from_secs(1)).await;
        assert!(state.fault.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_bus_is_not_a_fault() {
        let (transport, state, bridge) = setup();
        transport.set_health(BusStatus::Degraded("bus-off".into()));

        let handle = tokio::spawn(run_fault_monitor(
            transport,
            state.clone(),
            bridge,
            Duration::from_secs(1),
        ));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!state.fault.is_raised());
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_raised_elsewhere_is_not_reported_again() {
        let (transport, state, bridge) = setup();
        state.fault.raise();
        transport.set_health(BusStatus::HardwareUnreachable);

        run_fault_monitor(transport, state, bridge.clone(), Duration::from_secs(1)).await;
        assert!(bridge.statuses().is_empty());
    }
}
