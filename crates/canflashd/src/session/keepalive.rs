//! Keep-alive pings
//!
//! Keeps the unit in its bootloader between directives. Pings go out only
//! while the bridge asks for them, and a ping is skipped (never faulted)
//! when the adapter is unhealthy.

use std::sync::Arc;
use std::time::Duration;

use canflash_can::protocol::{can_id, KEEP_ALIVE_PAYLOAD};
use canflash_can::{CanFrame, CanTransport};
use tokio::time::MissedTickBehavior;

use super::SessionState;

pub async fn run_keep_alive(
    transport: Arc<dyn CanTransport>,
    state: Arc<SessionState>,
    interval: Duration,
) {
    let frame = match CanFrame::new(can_id::KEEP_ALIVE, &KEEP_ALIVE_PAYLOAD) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "Invalid keep-alive frame");
            return;
        }
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !state.keep_alive.is_raised() || state.fault.is_raised() {
            continue;
        }

        match transport.health().await {
            Ok(status) if status.is_reachable() => {}
            Ok(status) => {
                tracing::debug!(%status, "Adapter unhealthy, skipping keep-alive");
                continue;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Health query failed, skipping keep-alive");
                continue;
            }
        }

        match transport.send(&frame).await {
            Ok(()) => tracing::trace!("Keep-alive sent"),
            Err(e) => tracing::debug!(error = %e, "Keep-alive send failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canflash_can::transport::mock::MockCanTransport;
    use canflash_can::BusStatus;

    fn setup() -> (Arc<MockCanTransport>, Arc<SessionState>) {
        (
            Arc::new(MockCanTransport::new(&Default::default())),
            Arc::new(SessionState::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_pings_only_while_enabled() {
        let (transport, state) = setup();
        let handle = tokio::spawn(run_keep_alive(
            transport.clone(),
            state.clone(),
            Duration::from_millis(500),
        ));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(transport.sent_frames().is_empty());

        state.keep_alive.raise();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        state.keep_alive.clear();
        let sent = transport.sent_with_id(can_id::KEEP_ALIVE.raw());
        assert!(sent.len() >= 4, "sent {} pings", sent.len());
        assert!(sent.iter().all(|f| f.id().is_extended()));
        assert_eq!(sent[0].data(), &[1, 2, 3, 4, 5, 6, 7, 8]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.sent_frames().len(), sent.len());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_adapter_skips_without_fault() {
        let (transport, state) = setup();
        state.keep_alive.raise();
        transport.set_health(BusStatus::HardwareUnreachable);

        let handle = tokio::spawn(run_keep_alive(
            transport.clone(),
            state.clone(),
            Duration::from_millis(500),
        ));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(transport.sent_frames().is_empty());
        assert!(!state.fault.is_raised());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_does_not_raise_fault() {
        let (transport, state) = setup();
        state.keep_alive.raise();
        transport.set_fail_sends(true);

        let handle = tokio::spawn(run_keep_alive(
            transport,
            state.clone(),
            Duration::from_millis(500),
        ));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!state.fault.is_raised());
        handle.abort();
    }
}
