//! Session tests
//!
//! Drive the orchestrator one step at a time against the mock transport
//! and an in-memory bridge. Time is paused, so receive windows, pacing
//! and reconnect delays advance instantly.

use std::sync::Arc;
use std::time::Duration;

use canflash_can::config::MockConfig;
use canflash_can::protocol::can_id;
use canflash_can::transport::mock::{MockCanTransport, MockConnector};
use canflash_can::{BusStatus, CanTransport, TransportConfig};
use canflash_core::testing::{BridgeCall, RecordingBridge};
use canflash_core::{CanFrame, CanId, Directive, FlashPhase, StatusCode};
use canflashd::{DaemonConfig, SessionOrchestrator, StepOutcome};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const UNIT_ID: u16 = 0x1234;

struct Harness {
    connector: Arc<MockConnector>,
    transport: Arc<MockCanTransport>,
    bridge: Arc<RecordingBridge>,
    session: SessionOrchestrator,
    dir: TempDir,
}

fn config(dir: &TempDir) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.transport = TransportConfig::Mock(MockConfig::default());
    config.firmware.download_dir = dir.path().to_path_buf();
    config
}

fn harness_with(configure: impl FnOnce(&mut DaemonConfig)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    configure(&mut config);

    let connector = Arc::new(MockConnector::new(&MockConfig::default()));
    let transport = Arc::new(MockCanTransport::new(&MockConfig::default()));
    connector.prepare(transport.clone());
    let bridge = Arc::new(RecordingBridge::new());
    let session = SessionOrchestrator::new(config, bridge.clone(), connector.clone());

    Harness {
        connector,
        transport,
        bridge,
        session,
        dir,
    }
}

async fn started() -> Harness {
    let mut h = harness_with(|_| {});
    h.session.start().await;
    h
}

fn frame(id: CanId, data: &[u8]) -> CanFrame {
    CanFrame::new(id, data).unwrap()
}

/// Announce the unit and run a scan directive
async fn scan_unit(h: &mut Harness) {
    h.transport.inject(frame(CanId::standard(0x20), &[0x12, 0x34, 0x00, 0x00]));
    h.bridge.push_directive("scan_unit", false);
    assert_eq!(h.session.step().await, StepOutcome::Handled(Directive::ScanUnit));
}

/// One block of eight 0x0001 words behind a 22-byte header, then a zero
/// size field ending the chain. 46 bytes, CRC 0x8017.
fn firmware_hex() -> String {
    let mut image = vec![0u8; 22];
    image.extend_from_slice(&[0x08, 0x00]);
    image.extend_from_slice(&[0x00, 0x80, 0x00, 0x00]);
    for _ in 0..8 {
        image.extend_from_slice(&[0x01, 0x00]);
    }
    image.extend_from_slice(&[0x00, 0x00]);

    let hex: String = image.iter().map(|b| format!("{:02X}", b)).collect();
    format!("02{}03\r\n", hex)
}

// =============================================================================
// Scan
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_scan_reports_unit_id() {
    let mut h = started().await;
    scan_unit(&mut h).await;

    assert_eq!(h.session.state().unit_id(), Some(UNIT_ID));
    assert!(h.bridge.calls().contains(&BridgeCall::UnitId(UNIT_ID)));
    assert!(h.transport.sent_frames().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scan_without_unit_reports_not_found() {
    let mut h = started().await;
    h.bridge.push_directive("scan_unit", false);

    assert_eq!(h.session.step().await, StepOutcome::Handled(Directive::ScanUnit));
    assert_eq!(
        h.bridge.statuses(),
        vec![StatusCode::PcanConnected, StatusCode::UnitNotFound]
    );
    assert_eq!(h.session.state().unit_id(), None);
}

// =============================================================================
// Key exchange
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_key_exchange_reports_metadata() {
    let mut h = started().await;
    scan_unit(&mut h).await;

    let key = vec![0xAA, 0xBB, 0xCC, 0xDD];
    h.bridge.set_security_key(UNIT_ID, key.clone());
    h.transport.add_response(
        can_id::KEY_EXCHANGE.raw(),
        vec![
            frame(CanId::extended(can_id::KEY_ACK), &[0x08]),
            frame(
                CanId::extended(can_id::METADATA),
                &[0x03, 0x02, 0, 0, 0, 0, 0, 0x04],
            ),
            frame(
                CanId::extended(can_id::METADATA),
                &[0x00, 0x80, 0x00, 0x08, 0, 0, 0, 0x06],
            ),
        ],
    );
    h.bridge.push_directive("send_security_key", true);

    assert_eq!(
        h.session.step().await,
        StepOutcome::Handled(Directive::SendSecurityKey)
    );

    let sent = h.transport.sent_with_id(can_id::KEY_EXCHANGE.raw());
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data(), key.as_slice());

    let records = h
        .bridge
        .calls()
        .into_iter()
        .find_map(|call| match call {
            BridgeCall::Metadata(unit, records) => Some((unit, records)),
            _ => None,
        })
        .unwrap();
    assert_eq!(records.0, UNIT_ID);
    assert_eq!(records.1.len(), 2);

    let identity = h.session.state().identity().unwrap();
    assert_eq!(identity.firmware_version, 0x0203);
    assert_eq!(identity.application_entry_addr, 0x0800_8000);
    assert_eq!(identity.security_key, key);
}

#[tokio::test(start_paused = true)]
async fn test_missing_key_is_handshake_failure() {
    let mut h = started().await;
    scan_unit(&mut h).await;
    h.bridge.push_directive("send_security_key", false);

    h.session.step().await;

    assert!(h.transport.sent_with_id(can_id::KEY_EXCHANGE.raw()).is_empty());
    assert_eq!(
        h.bridge.statuses().last(),
        Some(&StatusCode::HandshakeFailed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_scan_transport_error_reports_adapter_failure() {
    let mut h = started().await;
    h.transport.close().await;
    h.bridge.push_directive("scan_unit", false);

    assert_eq!(h.session.step().await, StepOutcome::Handled(Directive::ScanUnit));
    assert!(h.session.state().fault.is_raised());
    assert_eq!(
        h.bridge.statuses(),
        vec![StatusCode::PcanConnected, StatusCode::PcanFailed]
    );
}

#[tokio::test(start_paused = true)]
async fn test_key_send_error_reports_adapter_failure() {
    let mut h = started().await;
    scan_unit(&mut h).await;
    h.bridge.set_security_key(UNIT_ID, vec![0xAA, 0xBB]);
    h.transport.set_fail_sends(true);
    h.bridge.push_directive("send_security_key", false);

    h.session.step().await;

    assert!(h.session.state().fault.is_raised());
    assert_eq!(
        h.bridge.statuses(),
        vec![StatusCode::PcanConnected, StatusCode::PcanFailed]
    );
    assert_eq!(h.bridge.count(|c| matches!(c, BridgeCall::Metadata(..))), 0);
}

#[tokio::test(start_paused = true)]
async fn test_directives_needing_a_unit_are_ignored_before_scan() {
    let mut h = started().await;
    h.bridge.set_security_key(UNIT_ID, vec![1, 2, 3, 4]);
    h.bridge.push_directive("send_security_key", false);
    h.bridge.push_directive("download_firmware", false);

    h.session.step().await;
    h.session.step().await;

    assert!(h.transport.sent_frames().is_empty());
    assert_eq!(h.bridge.count(|c| matches!(c, BridgeCall::KeyRequest(_))), 0);
    assert_eq!(
        h.bridge.count(|c| matches!(c, BridgeCall::FirmwareRequest(_))),
        0
    );
}

// =============================================================================
// Flashing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_flash_sends_image_and_verifies_crc() {
    let mut h = harness_with(|config| config.protocol.verify_crc = true);
    h.session.start().await;
    scan_unit(&mut h).await;

    h.bridge.set_firmware(UNIT_ID, firmware_hex());
    h.transport.add_response(
        can_id::FLASH_DATA.raw(),
        vec![frame(
            CanId::extended(can_id::METADATA),
            &[0x17, 0x80, 0, 0, 0, 0, 0, 0x0A],
        )],
    );
    h.bridge.push_directive("download_firmware", true);

    assert_eq!(
        h.session.step().await,
        StepOutcome::Handled(Directive::DownloadFirmware)
    );

    let sent = h.transport.sent_with_id(can_id::FLASH_DATA.raw());
    assert_eq!(sent.len(), 6);
    assert!(sent.iter().all(|f| f.len() == 8 && !f.id().is_extended()));
    assert_eq!(sent[5].data(), &[0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);

    let progress = h.bridge.progress();
    let last = progress.last().unwrap();
    assert_eq!(last.phase, FlashPhase::Completed);
    assert_eq!(last.percentage, 100.0);
    assert_eq!(
        progress
            .iter()
            .filter(|p| p.phase == FlashPhase::Completed)
            .count(),
        1
    );

    assert!(h.bridge.calls().contains(&BridgeCall::Status(
        StatusCode::CrcVerified,
        "crc=0x8017".to_string()
    )));
    assert_eq!(h.bridge.count(|c| *c == BridgeCall::SoftReset), 1);
    assert!(h.dir.path().join("received_4660.ergon").exists());
    assert!(!h.session.state().flashing.is_raised());
    assert!(!h.session.state().fault.is_raised());
}

#[tokio::test(start_paused = true)]
async fn test_missing_firmware_reports_download_failure() {
    let mut h = started().await;
    scan_unit(&mut h).await;
    h.bridge.push_directive("download_firmware", false);

    h.session.step().await;

    assert!(h.transport.sent_with_id(can_id::FLASH_DATA.raw()).is_empty());
    assert_eq!(
        h.bridge.statuses().last(),
        Some(&StatusCode::FirmwareDownloadFailed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_truncated_block_reports_invalid_firmware() {
    let mut h = started().await;
    scan_unit(&mut h).await;

    // Block claims 0x40 words, image holds far fewer
    let mut image = vec![0u8; 22];
    image.extend_from_slice(&[0x40, 0x00, 0, 0, 0, 0, 0x01, 0x00]);
    let hex: String = image.iter().map(|b| format!("{:02X}", b)).collect();
    h.bridge.set_firmware(UNIT_ID, hex);
    h.bridge.push_directive("download_firmware", false);

    h.session.step().await;

    assert!(h.transport.sent_with_id(can_id::FLASH_DATA.raw()).is_empty());
    assert_eq!(
        h.bridge.statuses().last(),
        Some(&StatusCode::FirmwareInvalid)
    );
}

#[tokio::test(start_paused = true)]
async fn test_adapter_loss_mid_flash_aborts_and_reconnects() {
    let mut h = started().await;
    scan_unit(&mut h).await;

    h.bridge.set_firmware(UNIT_ID, firmware_hex());
    h.transport.set_unreachable_after(2);
    h.bridge.push_directive("download_firmware", false);

    h.session.step().await;

    assert_eq!(h.transport.sent_with_id(can_id::FLASH_DATA.raw()).len(), 2);
    assert!(h.session.state().fault.is_raised());
    assert!(!h.session.state().flashing.is_raised());
    assert_eq!(h.bridge.count(|c| *c == BridgeCall::SoftReset), 2);

    h.bridge.push_directive("scan_unit", false);
    let outcome = h.session.step().await;
    assert_eq!(outcome, StepOutcome::Reconnected { attempts: 1 });
    assert!(h.transport.is_closed());
    assert_eq!(h.connector.opened().len(), 2);
    assert_eq!(h.bridge.pending_polls(), 1);
}

// =============================================================================
// Faults and reconnection
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_startup_failure_reconnects_before_polling() {
    let mut h = harness_with(|_| {});
    h.connector.fail_next(2);
    h.bridge.push_directive("scan_unit", false);

    h.session.start().await;
    assert!(h.session.state().fault.is_raised());
    assert_eq!(h.bridge.statuses(), vec![StatusCode::PcanFailed]);

    let outcome = h.session.step().await;
    assert_eq!(outcome, StepOutcome::Reconnected { attempts: 2 });
    assert_eq!(h.bridge.count(|c| *c == BridgeCall::Poll), 0);
    assert_eq!(h.connector.attempts(), 3);
    assert!(!h.session.state().fault.is_raised());

    assert_eq!(h.session.step().await, StepOutcome::Handled(Directive::ScanUnit));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_fault_blocks_dispatch_until_reconnected() {
    let mut h = started().await;
    h.transport.set_health(BusStatus::HardwareUnreachable);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(h.session.state().fault.is_raised());

    h.bridge.push_directive("scan_unit", false);
    let outcome = h.session.step().await;

    assert_eq!(outcome, StepOutcome::Reconnected { attempts: 1 });
    assert_eq!(h.bridge.count(|c| *c == BridgeCall::Poll), 0);
    assert!(h.transport.is_closed());
    assert_eq!(
        h.bridge.statuses(),
        vec![
            StatusCode::PcanConnected,
            StatusCode::PcanFailed,
            StatusCode::PcanConnected,
        ]
    );
}

// =============================================================================
// Polling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_poll_disables_keep_alive() {
    let mut h = started().await;
    h.bridge.push_idle(true);

    assert_eq!(h.session.step().await, StepOutcome::Idle);
    assert!(h.session.state().keep_alive.is_raised());

    h.bridge.set_unreachable(true);
    assert_eq!(h.session.step().await, StepOutcome::Idle);
    assert!(!h.session.state().keep_alive.is_raised());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_and_unknown_directives_are_ignored() {
    let mut h = started().await;
    h.bridge.push_directive("shutdown", false);
    h.bridge.push_directive("reboot", false);

    assert_eq!(h.session.step().await, StepOutcome::Handled(Directive::Shutdown));
    assert_eq!(
        h.session.step().await,
        StepOutcome::Handled(Directive::Other("reboot".to_string()))
    );
    assert_eq!(h.session.step().await, StepOutcome::Idle);
    assert!(h.transport.sent_frames().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_follows_bridge_flag() {
    let mut h = started().await;
    h.bridge.set_idle_keep_alive(true);

    h.session.step().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let pings = h.transport.sent_with_id(can_id::KEEP_ALIVE.raw());
    assert!(!pings.is_empty());
    assert!(pings.iter().all(|f| f.id().is_extended()));
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown_signal() {
    let mut h = harness_with(|_| {});

    h.session
        .run(tokio::time::sleep(Duration::from_secs(5)))
        .await;

    assert!(h.transport.is_closed());
    assert!(h.bridge.count(|c| *c == BridgeCall::Poll) >= 1);
}
