//! Mock transport adapter for testing

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canflash_core::CanFrame;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{BusStatus, CanTransport, TransportConnector, TransportError};
use crate::config::MockConfig;

/// Mock transport adapter for testing
///
/// Frames sent are recorded. Scripted responses are queued per sent
/// identifier: the first script registered for an id fires on the next
/// send to that id and is then consumed.
pub struct MockCanTransport {
    config: MockConfig,
    inbound_tx: mpsc::UnboundedSender<CanFrame>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<CanFrame>>,
    sent: RwLock<Vec<CanFrame>>,
    responses: RwLock<VecDeque<(u32, Vec<CanFrame>)>>,
    health: RwLock<BusStatus>,
    unreachable_after: AtomicUsize,
    fail_sends: AtomicBool,
    fail_health: AtomicBool,
    closed: AtomicBool,
}

impl MockCanTransport {
    pub fn new(config: &MockConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            config: config.clone(),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            sent: RwLock::new(Vec::new()),
            responses: RwLock::new(VecDeque::new()),
            health: RwLock::new(BusStatus::Ok),
            unreachable_after: AtomicUsize::new(usize::MAX),
            fail_sends: AtomicBool::new(false),
            fail_health: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Inject an incoming frame (simulates the unit transmitting)
    pub fn inject(&self, frame: CanFrame) {
        let _ = self.inbound_tx.send(frame);
    }

    /// Queue frames to arrive after the next send to `sent_id`
    pub fn add_response(&self, sent_id: u32, frames: Vec<CanFrame>) {
        self.responses.write().push_back((sent_id, frames));
    }

    /// All frames sent so far
    pub fn sent_frames(&self) -> Vec<CanFrame> {
        self.sent.read().clone()
    }

    /// Frames sent to one raw identifier
    pub fn sent_with_id(&self, raw_id: u32) -> Vec<CanFrame> {
        self.sent
            .read()
            .iter()
            .filter(|f| f.id().raw() == raw_id)
            .copied()
            .collect()
    }

    pub fn set_health(&self, status: BusStatus) {
        *self.health.write() = status;
    }

    /// Report the hardware as unreachable once `sends` frames went out
    pub fn set_unreachable_after(&self, sends: usize) {
        self.unreachable_after.store(sends, Ordering::SeqCst);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make health queries return an error
    pub fn set_fail_health(&self, fail: bool) {
        self.fail_health.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CanTransport for MockCanTransport {
    async fn send(&self, frame: &CanFrame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }

        // Simulate latency
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("mock send failure".to_string()));
        }

        let count = {
            let mut sent = self.sent.write();
            sent.push(*frame);
            sent.len()
        };
        if count >= self.unreachable_after.load(Ordering::SeqCst) {
            self.set_health(BusStatus::HardwareUnreachable);
        }

        let scripted = {
            let mut responses = self.responses.write();
            responses
                .iter()
                .position(|(id, _)| *id == frame.id().raw())
                .and_then(|idx| responses.remove(idx))
        };
        if let Some((_, frames)) = scripted {
            for reply in frames {
                self.inject(reply);
            }
        }

        tracing::debug!(?frame, "Mock transport: sent frame");
        Ok(())
    }

    async fn receive(
        &self,
        expected_id: Option<u32>,
        timeout: Duration,
    ) -> Result<Option<CanFrame>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }

        let deadline = Instant::now() + timeout;
        let mut rx = self.inbound_rx.lock().await;

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
                    tracing::debug!(?frame, ?expected_id, "Mock transport: discarding frame");
                }
                Ok(None) => return Err(TransportError::ConnectionClosed),
                Err(_) => return Ok(None),
            }
        }
    }

    async fn health(&self) -> Result<BusStatus, TransportError> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(TransportError::ReceiveFailed(
                "mock health query failed".to_string(),
            ));
        }
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        Ok(self.health.read().clone())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn channel(&self) -> String {
        "mock".to_string()
    }
}

/// Hands out mock transports; can be told to fail opens
pub struct MockConnector {
    config: MockConfig,
    failures_remaining: AtomicU32,
    attempts: AtomicU32,
    prepared: Mutex<VecDeque<Arc<MockCanTransport>>>,
    opened: RwLock<Vec<Arc<MockCanTransport>>>,
}

impl MockConnector {
    pub fn new(config: &MockConfig) -> Self {
        Self {
            config: config.clone(),
            failures_remaining: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            prepared: Mutex::new(VecDeque::new()),
            opened: RwLock::new(Vec::new()),
        }
    }

    /// Fail the next `count` opens with `AdapterUnavailable`
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Hand out `transport` on a later successful open
    pub fn prepare(&self, transport: Arc<MockCanTransport>) {
        self.prepared.lock().push_back(transport);
    }

    /// Transports handed out so far, oldest first
    pub fn opened(&self) -> Vec<Arc<MockCanTransport>> {
        self.opened.read().clone()
    }

    /// Open attempts, failed ones included
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn open(&self) -> Result<Arc<dyn CanTransport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(TransportError::AdapterUnavailable(
                "mock adapter unavailable".to_string(),
            ));
        }

        let transport = self
            .prepared
            .lock()
            .pop_front()
            .unwrap_or_else(|| Arc::new(MockCanTransport::new(&self.config)));
        self.opened.write().push(transport.clone());
        Ok(transport)
    }
}
