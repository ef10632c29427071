//! SocketCAN adapter using a raw CAN socket

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canflash_core::{CanFrame, CanId};
use parking_lot::Mutex;
use socketcan::{CanSocket, EmbeddedFrame, ExtendedId, Frame, Id, Socket, StandardId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::SocketCanConfig;
use crate::transport::{BusStatus, CanTransport, TransportConnector, TransportError};

/// errno values meaning the interface itself is gone
const ENXIO: i32 = 6;
const ENODEV: i32 = 19;
const ENETDOWN: i32 = 100;

/// SocketCAN adapter on a raw CAN socket
pub struct SocketCanAdapter {
    config: SocketCanConfig,
    socket: Arc<Mutex<CanSocket>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<CanFrame>>,
    /// Cleared on close; stops this instance's listener
    running: Arc<AtomicBool>,
    /// Set by the listener or a send after a fatal socket error
    hardware_lost: Arc<AtomicBool>,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SocketCanAdapter {
    pub fn open(config: &SocketCanConfig) -> Result<Self, TransportError> {
        let socket = Self::create_socket(config)?;

        // Drain any stale frames from the socket (from before this session)
        Self::drain_socket(&socket);

        let (tx, rx) = mpsc::channel(config.rx_queue.max(1));

        let adapter = Self {
            config: config.clone(),
            socket: Arc::new(Mutex::new(socket)),
            rx: tokio::sync::Mutex::new(rx),
            running: Arc::new(AtomicBool::new(true)),
            hardware_lost: Arc::new(AtomicBool::new(false)),
            listener_handle: Mutex::new(None),
        };

        // Start background listener for incoming frames
        adapter.start_listener(tx);

        tracing::info!(
            interface = %config.interface,
            bitrate = config.bitrate,
            "SocketCAN adapter opened"
        );

        Ok(adapter)
    }

    fn create_socket(config: &SocketCanConfig) -> Result<CanSocket, TransportError> {
        let socket = CanSocket::open(&config.interface).map_err(|e| {
            TransportError::AdapterUnavailable(format!(
                "Failed to open CAN socket on {}: {}",
                config.interface, e
            ))
        })?;

        // Set socket to non-blocking for async operation
        socket.set_nonblocking(true).map_err(|e| {
            TransportError::InvalidConfig(format!("Failed to set non-blocking: {}", e))
        })?;

        Ok(socket)
    }

    /// Drain any pending frames from the socket to clear stale messages
    fn drain_socket(socket: &CanSocket) {
        while let Ok(frame) = socket.read_frame() {
            tracing::debug!(id = frame.raw_id(), "Drained stale frame from socket");
        }
    }

    fn start_listener(&self, tx: mpsc::Sender<CanFrame>) {
        let socket = self.socket.clone();
        let running = self.running.clone();
        let hardware_lost = self.hardware_lost.clone();
        let interface = self.config.interface.clone();

        let handle = tokio::task::spawn_blocking(move || {
            while running.load(Ordering::SeqCst) {
                let result = socket.lock().read_frame();
                match result {
                    Ok(socketcan::CanFrame::Error(_)) => {
                        tracing::debug!(interface = %interface, "Ignoring CAN error frame");
                    }
                    Ok(frame) => {
                        let Some(frame) = from_socketcan(&frame) else {
                            continue;
                        };
                        match tx.try_send(frame) {
                            Ok(()) => {}
                            Err(TrySendError::Full(frame)) => {
                                tracing::debug!(?frame, "Receive queue full, dropping frame");
                            }
                            Err(TrySendError::Closed(_)) => break,
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                        // Non-blocking socket, no data available
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    Err(e) => {
                        if is_fatal(&e) {
                            tracing::error!(interface = %interface, error = %e, "CAN adapter lost");
                            hardware_lost.store(true, Ordering::SeqCst);
                            break;
                        }
                        tracing::warn!(error = %e, "SocketCAN read error");
                        std::thread::sleep(Duration::from_millis(100));
                    }
                }
            }
            tracing::debug!(interface = %interface, "SocketCAN listener stopped");
        });

        *self.listener_handle.lock() = Some(handle);
    }

    fn operstate_path(&self) -> PathBuf {
        PathBuf::from("/sys/class/net")
            .join(&self.config.interface)
            .join("operstate")
    }
}

#[async_trait]
impl CanTransport for SocketCanAdapter {
    async fn send(&self, frame: &CanFrame) -> Result<(), TransportError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let raw = to_socketcan(frame)?;
        let socket = self.socket.clone();

        let result = tokio::task::spawn_blocking(move || socket.lock().write_frame(&raw))
            .await
            .map_err(|e| TransportError::SendFailed(format!("Task join error: {}", e)))?;

        result.map_err(|e| {
            if is_fatal(&e) {
                self.hardware_lost.store(true, Ordering::SeqCst);
                TransportError::HardwareUnreachable(e.to_string())
            } else {
                TransportError::SendFailed(e.to_string())
            }
        })
    }

    async fn receive(
        &self,
        expected_id: Option<u32>,
        timeout: Duration,
    ) -> Result<Option<CanFrame>, TransportError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let deadline = Instant::now() + timeout;
        let mut rx = self.rx.lock().await;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(frame)) => {
                    if expected_id.map_or(true, |id| frame.id().raw() == id) {
                        return Ok(Some(frame));
                    }
                    // A different frame (status broadcast, pings echoed back)
                    tracing::trace!(?frame, ?expected_id, "Ignoring non-matching frame");
                }
                Ok(None) => {
                    // Listener exited
                    if self.hardware_lost.load(Ordering::SeqCst) {
                        return Err(TransportError::HardwareUnreachable(
                            self.config.interface.clone(),
                        ));
                    }
                    return Err(TransportError::ConnectionClosed);
                }
                Err(_) => return Ok(None),
            }
        }
    }

    async fn health(&self) -> Result<BusStatus, TransportError> {
        if self.hardware_lost.load(Ordering::SeqCst) {
            return Ok(BusStatus::HardwareUnreachable);
        }

        match tokio::fs::read_to_string(self.operstate_path()).await {
            Ok(state) => match state.trim() {
                "down" | "lowerlayerdown" | "notpresent" => {
                    Ok(BusStatus::Degraded(format!("interface {}", state.trim())))
                }
                _ => Ok(BusStatus::Ok),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BusStatus::HardwareUnreachable),
            Err(e) => Err(TransportError::ReceiveFailed(format!(
                "Failed to read interface state: {}",
                e
            ))),
        }
    }

    async fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.listener_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::debug!(interface = %self.config.interface, "SocketCAN adapter closed");
    }

    fn channel(&self) -> String {
        self.config.interface.clone()
    }
}

impl Drop for SocketCanAdapter {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Opens [`SocketCanAdapter`]s for one interface
pub struct SocketCanConnector {
    config: SocketCanConfig,
}

impl SocketCanConnector {
    pub fn new(config: &SocketCanConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl TransportConnector for SocketCanConnector {
    async fn open(&self) -> Result<Arc<dyn CanTransport>, TransportError> {
        let adapter = SocketCanAdapter::open(&self.config)?;
        Ok(Arc::new(adapter))
    }
}

fn is_fatal(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(ENODEV) | Some(ENETDOWN) | Some(ENXIO))
}

/// Convert to a socketcan frame, masking the id to the frame format
fn to_socketcan(frame: &CanFrame) -> Result<socketcan::CanFrame, TransportError> {
    let id = frame.id();
    let raw_id: Id = if id.is_extended() {
        ExtendedId::new(id.wire_id()).map(Id::Extended)
    } else {
        StandardId::new(id.wire_id() as u16).map(Id::Standard)
    }
    .ok_or_else(|| TransportError::InvalidConfig(format!("Invalid CAN ID: {}", id)))?;

    socketcan::CanFrame::new(raw_id, frame.data())
        .ok_or_else(|| TransportError::SendFailed(format!("Invalid CAN frame for {}", id)))
}

fn from_socketcan(frame: &socketcan::CanFrame) -> Option<CanFrame> {
    let id = if frame.is_extended() {
        CanId::extended(frame.raw_id())
    } else {
        CanId::standard(frame.raw_id())
    };
    CanFrame::new(id, frame.data()).ok()
}
