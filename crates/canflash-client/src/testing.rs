//! Test utilities for canflash-client
//!
//! [`TestBridge`] serves the bridge's REST endpoints from memory on a
//! loopback port, so the client (and the daemon) can be exercised over
//! real HTTP.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use crate::config::BridgeConfig;
use crate::types::*;
use crate::{BridgeClient, Result};

/// Everything the in-memory bridge serves and records
#[derive(Debug, Default)]
pub struct BridgeState {
    commands: Mutex<VecDeque<String>>,
    ping_active: AtomicBool,
    keys: Mutex<HashMap<u16, Vec<u8>>>,
    firmware: Mutex<HashMap<u16, Bytes>>,
    statuses: Mutex<Vec<StatusRequest>>,
    unit_ids: Mutex<Vec<u16>>,
    metadata: Mutex<Vec<UnitMetadataRequest>>,
    progress: Mutex<Vec<FlashProgressRequest>>,
    soft_resets: AtomicU32,
}

impl BridgeState {
    /// Queue a command for a later `GET /next-command`
    pub fn push_command(&self, command: &str) {
        self.commands.lock().push_back(command.to_string());
    }

    pub fn set_ping_active(&self, active: bool) {
        self.ping_active.store(active, Ordering::SeqCst);
    }

    pub fn set_security_key(&self, unit_id: u16, key: Vec<u8>) {
        self.keys.lock().insert(unit_id, key);
    }

    pub fn set_firmware(&self, unit_id: u16, archive: impl Into<Bytes>) {
        self.firmware.lock().insert(unit_id, archive.into());
    }

    pub fn statuses(&self) -> Vec<StatusRequest> {
        self.statuses.lock().clone()
    }

    pub fn unit_ids(&self) -> Vec<u16> {
        self.unit_ids.lock().clone()
    }

    pub fn metadata(&self) -> Vec<UnitMetadataRequest> {
        self.metadata.lock().clone()
    }

    pub fn progress(&self) -> Vec<FlashProgressRequest> {
        self.progress.lock().clone()
    }

    pub fn soft_resets(&self) -> u32 {
        self.soft_resets.load(Ordering::SeqCst)
    }
}

/// Router serving the bridge endpoints from `state`
pub fn bridge_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/next-command", get(next_command))
        .route("/status", post(report_status))
        .route("/unit-id", post(report_unit_id))
        .route("/security-key/{unit_id}", get(security_key))
        .route("/unit-metadata", post(report_metadata))
        .route("/flashing-progress", post(report_progress))
        .route("/soft-reset", post(soft_reset))
        .route("/firmware/{unit_id}", get(firmware))
        .with_state(state)
}

async fn next_command(State(state): State<Arc<BridgeState>>) -> Json<NextCommandResponse> {
    Json(NextCommandResponse {
        command: state.commands.lock().pop_front(),
        ping_active: state.ping_active.load(Ordering::SeqCst),
    })
}

async fn report_status(
    State(state): State<Arc<BridgeState>>,
    Json(body): Json<StatusRequest>,
) -> StatusCode {
    state.statuses.lock().push(body);
    StatusCode::OK
}

async fn report_unit_id(
    State(state): State<Arc<BridgeState>>,
    Json(body): Json<UnitIdRequest>,
) -> StatusCode {
    state.unit_ids.lock().push(body.unit_id);
    StatusCode::OK
}

async fn security_key(
    State(state): State<Arc<BridgeState>>,
    Path(unit_id): Path<u16>,
) -> Response {
    match state.keys.lock().get(&unit_id).cloned() {
        Some(key) => Json(SecurityKeyResponse { key: Some(key) }).into_response(),
        None => not_found(format!("no key for unit {}", unit_id)),
    }
}

async fn report_metadata(
    State(state): State<Arc<BridgeState>>,
    Json(body): Json<UnitMetadataRequest>,
) -> StatusCode {
    state.metadata.lock().push(body);
    StatusCode::OK
}

async fn report_progress(
    State(state): State<Arc<BridgeState>>,
    Json(body): Json<FlashProgressRequest>,
) -> StatusCode {
    state.progress.lock().push(body);
    StatusCode::OK
}

async fn soft_reset(State(state): State<Arc<BridgeState>>) -> StatusCode {
    state.soft_resets.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

async fn firmware(State(state): State<Arc<BridgeState>>, Path(unit_id): Path<u16>) -> Response {
    match state.firmware.lock().get(&unit_id).cloned() {
        Some(archive) => archive.into_response(),
        None => not_found(format!("no firmware for unit {}", unit_id)),
    }
}

fn not_found(error: String) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error })).into_response()
}

/// An in-process bridge that shuts down when dropped
pub struct TestBridge {
    pub addr: SocketAddr,
    pub client: BridgeClient,
    pub state: Arc<BridgeState>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestBridge {
    /// Start a bridge with empty state
    ///
    /// # Example
    ///
    /// ```ignore
    /// use canflash_client::testing::TestBridge;
    ///
    /// let bridge = TestBridge::start().await?;
    /// bridge.state.push_command("scan_unit");
    /// let poll = bridge.client.poll_next_command().await?;
    /// ```
    pub async fn start() -> Result<Self> {
        Self::start_with_timeout(Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Start a bridge whose client uses custom timeouts
    pub async fn start_with_timeout(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let state = Arc::new(BridgeState::default());

        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let router = bridge_router(state.clone());

        // Spawn the server
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let config = BridgeConfig::builder(format!("http://{}", addr))
            .request_timeout(timeout)
            .connect_timeout(connect_timeout)
            .build();
        let client = BridgeClient::from_config(&config)?;

        Ok(Self {
            addr,
            client,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test bridge
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
