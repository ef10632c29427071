//! Session orchestrator - the command loop
//!
//! Polls the bridge for the next directive and dispatches it to the
//! handshake, staging and transfer code. While the fault flag is raised no
//! directive is dispatched; the next step blocks on the reconnect instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use canflash_can::protocol::verify::verify_crc;
use canflash_can::{
    CanTransport, FlashTransfer, Handshake, HandshakeError, KeyExchangeOutcome, TransferError,
    TransportConnector,
};
use canflash_core::{BestEffort, Bridge, Directive, StatusCode};

use super::heartbeat::run_heartbeat;
use super::{BackgroundTasks, ReconnectManager, SessionState};
use crate::config::DaemonConfig;
use crate::staging::{FirmwareStager, FirmwareUnpacker, PlainHexUnpacker};

/// What one pass of the command loop did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The fault flag was raised; the adapter was reopened
    Reconnected { attempts: u32 },
    /// The bridge had nothing to do
    Idle,
    /// A fault was raised between the poll and the dispatch
    FaultPending,
    Handled(Directive),
}

pub struct SessionOrchestrator {
    config: DaemonConfig,
    bridge: Arc<dyn Bridge>,
    connector: Arc<dyn TransportConnector>,
    state: Arc<SessionState>,
    tasks: BackgroundTasks,
    reconnect: ReconnectManager,
    stager: FirmwareStager,
    idle_polls: u32,
}

impl SessionOrchestrator {
    pub fn new(
        config: DaemonConfig,
        bridge: Arc<dyn Bridge>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        let tasks = BackgroundTasks::new(bridge.clone(), &config.session);
        let reconnect = ReconnectManager::new(
            connector.clone(),
            bridge.clone(),
            config.session.reconnect_delay(),
        );
        let stager = FirmwareStager::new(
            config.firmware.download_dir.clone(),
            Box::new(PlainHexUnpacker),
        );

        Self {
            config,
            bridge,
            connector,
            state: Arc::new(SessionState::new()),
            tasks,
            reconnect,
            stager,
            idle_polls: 0,
        }
    }

    /// Replace the archive unpacker
    pub fn with_unpacker(mut self, unpacker: Box<dyn FirmwareUnpacker>) -> Self {
        self.stager = FirmwareStager::new(self.config.firmware.download_dir.clone(), unpacker);
        self
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Open the adapter and start the background tasks
    ///
    /// An adapter that cannot be opened raises the fault flag, so the
    /// first step goes straight into the reconnect loop.
    pub async fn start(&mut self) {
        match self.connector.open().await {
            Ok(transport) => {
                let channel = transport.channel();
                self.state.set_transport(transport.clone());
                self.tasks.restart(transport, &self.state);
                tracing::info!(channel = %channel, "CAN adapter connected");
                self.bridge
                    .report_status(StatusCode::PcanConnected, &channel)
                    .await
                    .best_effort("report adapter connected");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to open CAN adapter");
                self.state.fault.raise();
                self.bridge
                    .report_status(StatusCode::PcanFailed, &e.to_string())
                    .await
                    .best_effort("report adapter failure");
            }
        }
    }

    /// Run the command loop until `shutdown` resolves
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start().await;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = self.step() => {}
            }
        }

        self.stop().await;
    }

    /// Stop the background tasks and release the adapter
    pub async fn stop(&mut self) {
        self.tasks.stop();
        self.state.flashing.clear();
        if let Some(transport) = self.state.take_transport() {
            transport.close().await;
        }
        tracing::info!("Session stopped");
    }

    /// One pass of the command loop
    pub async fn step(&mut self) -> StepOutcome {
        if self.state.fault.is_raised() {
            tracing::warn!("Adapter fault raised, reconnecting");
            let attempts = self.reconnect.reconnect(&self.state, &mut self.tasks).await;
            return StepOutcome::Reconnected { attempts };
        }

        let poll = self
            .bridge
            .poll_next_command()
            .await
            .best_effort("poll next command")
            .unwrap_or_default();
        self.state.keep_alive.set(poll.keep_alive);

        if self.state.fault.is_raised() {
            return StepOutcome::FaultPending;
        }

        let Some(directive) = poll.directive else {
            self.idle_polls += 1;
            if self.idle_polls % self.config.session.idle_log_every.max(1) == 0 {
                tracing::info!(polls = self.idle_polls, "No directive from bridge");
            }
            tokio::time::sleep(self.config.session.poll_interval()).await;
            return StepOutcome::Idle;
        };
        self.idle_polls = 0;

        tracing::debug!(%directive, keep_alive = poll.keep_alive, "Directive received");
        let pause = self.dispatch(&directive).await;
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        StepOutcome::Handled(directive)
    }

    /// Run one directive, returning how long to wait before the next poll
    async fn dispatch(&self, directive: &Directive) -> Duration {
        let poll_interval = self.config.session.poll_interval();

        match directive {
            Directive::ScanUnit => {
                if let Some(transport) = self.transport() {
                    self.scan(transport).await;
                }
                poll_interval
            }
            Directive::Idle => poll_interval,
            Directive::SendSecurityKey => {
                if let Some(transport) = self.transport() {
                    self.send_security_key(transport).await;
                }
                poll_interval
            }
            Directive::DownloadFirmware => match self.transport() {
                Some(transport) => self.flash(transport).await,
                None => poll_interval,
            },
            Directive::WaitForFirmware => {
                tracing::debug!("Waiting for firmware");
                self.config.session.wait_for_firmware()
            }
            Directive::Shutdown => {
                tracing::info!("Shutdown directive ignored, session stays up");
                poll_interval
            }
            Directive::Other(command) => {
                tracing::warn!(command = %command, "Unknown directive ignored");
                poll_interval
            }
        }
    }

    /// Current transport; a missing one counts as an adapter fault
    fn transport(&self) -> Option<Arc<dyn CanTransport>> {
        let transport = self.state.transport();
        if transport.is_none() {
            tracing::warn!("No CAN transport open");
            self.state.fault.raise();
        }
        transport
    }

    fn handshake(&self, transport: Arc<dyn CanTransport>) -> Handshake {
        Handshake::new(
            transport,
            self.config.protocol.clone(),
            self.state.fault.clone(),
        )
    }

    async fn scan(&self, transport: Arc<dyn CanTransport>) {
        match self.handshake(transport).scan().await {
            Ok(Some(unit_id)) => {
                self.state.begin_unit(unit_id);
                self.bridge
                    .report_unit_id(unit_id)
                    .await
                    .best_effort("report unit id");
            }
            Ok(None) => {
                self.bridge
                    .report_status(StatusCode::UnitNotFound, "")
                    .await
                    .best_effort("report unit not found");
            }
            Err(e) => {
                tracing::error!(error = %e, "Scan failed");
                self.report_handshake_error(&e).await;
            }
        }
    }

    async fn send_security_key(&self, transport: Arc<dyn CanTransport>) {
        let Some(unit_id) = self.state.unit_id() else {
            tracing::warn!("No unit scanned, security key not sent");
            return;
        };

        let key = self
            .bridge
            .fetch_security_key(unit_id)
            .await
            .best_effort("fetch security key")
            .flatten();
        let Some(key) = key else {
            tracing::warn!(unit_id = format!("0x{:04X}", unit_id), "No security key available");
            self.report_handshake_failed("no security key").await;
            return;
        };

        match self.handshake(transport).exchange_key(&key).await {
            Ok(KeyExchangeOutcome::Accepted { records, attempts }) => {
                tracing::info!(
                    unit_id = format!("0x{:04X}", unit_id),
                    attempts,
                    records = records.len(),
                    "Handshake complete"
                );
                self.state.record_handshake(&key, &records);
                self.bridge
                    .report_unit_metadata(unit_id, &records)
                    .await
                    .best_effort("report unit metadata");
            }
            Ok(KeyExchangeOutcome::Rejected { attempts }) => {
                self.report_handshake_failed(&format!(
                    "key not accepted after {} attempts",
                    attempts
                ))
                .await;
            }
            Err(e @ HandshakeError::KeyTooLong(_)) => {
                self.report_handshake_failed(&e.to_string()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Key exchange failed");
                self.report_handshake_error(&e).await;
            }
        }
    }

    /// Adapter errors during a handshake are reported as an adapter failure
    async fn report_handshake_error(&self, error: &HandshakeError) {
        if let HandshakeError::Transport(e) = error {
            self.bridge
                .report_status(StatusCode::PcanFailed, &e.to_string())
                .await
                .best_effort("report adapter failure");
        }
    }

    async fn report_handshake_failed(&self, detail: &str) {
        self.bridge
            .report_status(StatusCode::HandshakeFailed, detail)
            .await
            .best_effort("report handshake failure");
    }

    /// Stage, checksum and send the unit's firmware
    async fn flash(&self, transport: Arc<dyn CanTransport>) -> Duration {
        let poll_interval = self.config.session.poll_interval();
        let Some(unit_id) = self.state.unit_id() else {
            tracing::warn!("No unit scanned, firmware download ignored");
            return poll_interval;
        };

        let image = match self.stager.stage(&*self.bridge, unit_id).await {
            Ok(image) => image,
            Err(e) => {
                let status = if e.is_download() {
                    StatusCode::FirmwareDownloadFailed
                } else {
                    StatusCode::FirmwareInvalid
                };
                tracing::error!(error = %e, %status, "Firmware staging failed");
                self.bridge
                    .report_status(status, &e.to_string())
                    .await
                    .best_effort("report staging failure");
                return poll_interval;
            }
        };

        let crc = match image.crc() {
            Ok(crc) => crc,
            Err(e) => {
                tracing::error!(error = %e, "Firmware block structure invalid");
                self.bridge
                    .report_status(StatusCode::FirmwareInvalid, &e.to_string())
                    .await
                    .best_effort("report invalid firmware");
                return poll_interval;
            }
        };
        tracing::info!(
            crc = format!("0x{:04X}", crc.crc),
            data_size_words = crc.data_size_words,
            blocks = crc.blocks,
            "Firmware checksum computed"
        );

        if self.state.fault.is_raised() {
            tracing::warn!("Adapter fault raised, transfer not started");
            return poll_interval;
        }

        self.state.flashing.raise();
        let heartbeat = tokio::spawn(run_heartbeat(
            self.state.clone(),
            self.bridge.clone(),
            self.config.session.heartbeat_interval(),
        ));

        let transfer = FlashTransfer::new(
            transport.clone(),
            self.bridge.clone(),
            self.state.fault.clone(),
            self.state.flashing.clone(),
            &self.config.protocol,
        );
        let result = transfer.run(&image).await;

        self.state.flashing.clear();
        heartbeat.abort();

        match result {
            Ok(summary) => {
                tracing::info!(
                    frames = summary.frames_sent,
                    bytes = summary.bytes,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "Firmware flashed"
                );
                if self.config.protocol.verify_crc {
                    self.verify(transport.as_ref(), crc.crc).await;
                }
                self.config.session.post_flash_cooldown()
            }
            Err(e @ TransferError::Aborted { .. }) => {
                tracing::error!(error = %e, "Firmware transfer aborted");
                poll_interval
            }
            Err(e) => {
                tracing::error!(error = %e, "Firmware transfer not started");
                self.bridge
                    .report_status(StatusCode::FirmwareInvalid, &e.to_string())
                    .await
                    .best_effort("report invalid firmware");
                poll_interval
            }
        }
    }

    async fn verify(&self, transport: &dyn CanTransport, expected: u16) {
        match verify_crc(transport, expected, self.config.protocol.verify_window()).await {
            Ok(verdict) => {
                self.bridge
                    .report_status(verdict.status(), &verdict.detail())
                    .await
                    .best_effort("report crc verdict");
            }
            Err(e) => {
                tracing::error!(error = %e, "CRC verification failed");
                self.state.fault.raise();
            }
        }
    }
}
