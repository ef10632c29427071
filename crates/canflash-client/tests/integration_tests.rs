//! Integration tests for canflash-client
//!
//! These tests run the in-process bridge and drive it through the client
//! over HTTP, so the client stays in sync with the bridge's endpoints.

use std::time::Duration;

use canflash_client::testing::TestBridge;
use canflash_client::{BridgeClient, BridgeConfig, FlashProgressRequest, StatusRequest};
use canflash_core::{
    BestEffort, Bridge, BridgeError, Directive, FlashPhase, FlashProgress, MetadataRecord,
    StatusCode,
};
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_poll_returns_queued_directives_then_none() {
    let bridge = TestBridge::start().await.unwrap();
    bridge.state.push_command("scan_unit");
    bridge.state.push_command("firmware_magic");
    bridge.state.set_ping_active(true);

    let first = assert_ok!(bridge.client.poll_next_command().await);
    assert_eq!(first.directive, Some(Directive::ScanUnit));
    assert!(first.keep_alive);

    let second = assert_ok!(bridge.client.poll_next_command().await);
    assert_eq!(
        second.directive,
        Some(Directive::Other("firmware_magic".to_string()))
    );

    let third = assert_ok!(bridge.client.poll_next_command().await);
    assert_eq!(third.directive, None);
}

#[tokio::test]
async fn test_status_and_unit_id_reports() {
    let bridge = TestBridge::start().await.unwrap();

    assert_ok!(
        bridge
            .client
            .report_status(StatusCode::UnitNotFound, "")
            .await
    );
    assert_ok!(
        bridge
            .client
            .report_status(StatusCode::CrcMismatch, "expected=0x8017 got=0x1234")
            .await
    );
    assert_ok!(bridge.client.report_unit_id(0x1234).await);

    assert_eq!(
        bridge.state.statuses(),
        vec![
            StatusRequest {
                status: "unit_not_found".to_string(),
                detail: String::new(),
            },
            StatusRequest {
                status: "crc_mismatch".to_string(),
                detail: "expected=0x8017 got=0x1234".to_string(),
            },
        ]
    );
    assert_eq!(bridge.state.unit_ids(), vec![0x1234]);
}

#[tokio::test]
async fn test_security_key_lookup() {
    let bridge = TestBridge::start().await.unwrap();
    bridge
        .state
        .set_security_key(0x1234, vec![0xDE, 0xAD, 0xBE, 0xEF]);

    let key = assert_ok!(bridge.client.fetch_security_key(0x1234).await);
    assert_eq!(key, Some(vec![0xDE, 0xAD, 0xBE, 0xEF]));

    // Unknown unit: no key, not an error
    let missing = assert_ok!(bridge.client.fetch_security_key(0x0001).await);
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_metadata_report_uses_labels_and_hex() {
    let bridge = TestBridge::start().await.unwrap();
    let records = vec![
        MetadataRecord {
            tag: 0x04,
            value: 0x0102,
            raw: vec![0x02, 0x01, 0, 0, 0, 0, 0, 0x04],
        },
        MetadataRecord {
            tag: 0x42,
            value: 0x0001,
            raw: vec![0x01, 0, 0, 0, 0, 0, 0, 0x42],
        },
    ];

    assert_ok!(bridge.client.report_unit_metadata(0x1234, &records).await);

    let reports = bridge.state.metadata();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].unit_id, 0x1234);
    assert_eq!(reports[0].metadata[0].tag_name, "Firmware_version");
    assert_eq!(reports[0].metadata[0].raw_bytes, "0201000000000004");
    assert_eq!(reports[0].metadata[1].tag_name, "Unknown_42");
}

#[tokio::test]
async fn test_progress_and_soft_reset() {
    let bridge = TestBridge::start().await.unwrap();

    assert_ok!(
        bridge
            .client
            .report_flash_progress(&FlashProgress::new(FlashPhase::Flashing, 1, 3))
            .await
    );
    assert_ok!(
        bridge
            .client
            .report_flash_progress(&FlashProgress::new(FlashPhase::Completed, 3, 3))
            .await
    );
    assert_ok!(bridge.client.request_soft_reset().await);

    assert_eq!(
        bridge.state.progress(),
        vec![
            FlashProgressRequest {
                status: "flashing".to_string(),
                percentage: 33.33,
                frames: 1,
                total_frames: 3,
            },
            FlashProgressRequest {
                status: "completed".to_string(),
                percentage: 100.0,
                frames: 3,
                total_frames: 3,
            },
        ]
    );
    assert_eq!(bridge.state.soft_resets(), 1);
}

#[tokio::test]
async fn test_firmware_download_and_missing_archive() {
    let bridge = TestBridge::start().await.unwrap();
    bridge.state.set_firmware(0x1234, b"020102030403".to_vec());

    let archive = assert_ok!(bridge.client.fetch_firmware_archive(0x1234).await);
    assert_eq!(&archive[..], b"020102030403");

    let err = assert_err!(bridge.client.fetch_firmware_archive(0x9999).await);
    assert!(matches!(err, BridgeError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_stopped_bridge_is_unreachable_and_best_effort_continues() {
    let bridge = TestBridge::start().await.unwrap();
    let base_url = bridge.base_url();
    bridge.shutdown().await;

    let config = BridgeConfig::builder(base_url)
        .connect_timeout(Duration::from_millis(200))
        .request_timeout(Duration::from_millis(500))
        .build();
    let client = BridgeClient::from_config(&config).unwrap();

    let err = assert_err!(client.poll_next_command().await);
    assert!(err.is_unreachable(), "got {:?}", err);

    let reported = client
        .report_status(StatusCode::PcanConnected, "")
        .await
        .best_effort("report status");
    assert_eq!(reported, None);
}
