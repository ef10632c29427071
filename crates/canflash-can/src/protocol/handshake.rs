//! Unit discovery and security-key exchange

use std::sync::Arc;

use canflash_core::{CanFrame, MetadataRecord, MAX_DATA_LEN};
use tokio::time::Instant;

use super::error::HandshakeError;
use super::{can_id, metadata, ACK_ACCEPTED, ACK_REJECTED};
use crate::config::ProtocolConfig;
use crate::signal::SharedFlag;
use crate::transport::{CanTransport, TransportError};

/// Handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Scanning,
    KeyExchange,
    MetadataCollection,
    Done,
    Failed,
}

/// Result of a key exchange that ran to the end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyExchangeOutcome {
    /// Key accepted; `records` were collected afterwards (possibly none)
    Accepted {
        records: Vec<MetadataRecord>,
        attempts: u32,
    },
    /// Every attempt was rejected or went unanswered
    Rejected { attempts: u32 },
}

impl KeyExchangeOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Drives scan, key exchange and metadata collection on one transport
pub struct Handshake {
    transport: Arc<dyn CanTransport>,
    config: ProtocolConfig,
    fault: SharedFlag,
    state: HandshakeState,
}

impl Handshake {
    pub fn new(
        transport: Arc<dyn CanTransport>,
        config: ProtocolConfig,
        fault: SharedFlag,
    ) -> Self {
        Self {
            transport,
            config,
            fault,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Listen for a unit announcing itself
    ///
    /// Returns `Ok(None)` when nothing qualifying arrives before the scan
    /// timeout. A transport error raises the fault flag.
    pub async fn scan(&mut self) -> Result<Option<u16>, HandshakeError> {
        self.ensure_no_fault()?;
        self.state = HandshakeState::Scanning;

        let timeout = self.config.scan_timeout();
        let deadline = Instant::now() + timeout;
        tracing::info!(timeout_ms = timeout.as_millis() as u64, "Scanning for unit");

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let frame = match self.transport.receive(None, remaining).await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => return Err(self.fail_transport(e)),
            };

            if let Some(unit_id) = unit_id_from(&frame) {
                tracing::info!(unit_id = format!("0x{:04X}", unit_id), "Unit found");
                self.state = HandshakeState::Idle;
                return Ok(Some(unit_id));
            }
            tracing::trace!(?frame, "Ignoring frame during scan");
        }

        tracing::info!("No unit found");
        self.state = HandshakeState::Idle;
        Ok(None)
    }

    /// Send the security key until the unit accepts it or attempts run out
    ///
    /// On acceptance the metadata the unit sends is collected.
    pub async fn exchange_key(
        &mut self,
        key: &[u8],
    ) -> Result<KeyExchangeOutcome, HandshakeError> {
        if key.len() > MAX_DATA_LEN {
            return Err(HandshakeError::KeyTooLong(key.len()));
        }

        let frame = CanFrame::new(can_id::KEY_EXCHANGE, key)
            .map_err(|e| HandshakeError::Transport(e.into()))?;
        let attempts = self.config.key_attempts.max(1);

        for attempt in 1..=attempts {
            self.ensure_no_fault()?;
            self.state = HandshakeState::KeyExchange;
            tracing::info!(attempt, attempts, key = %hex::encode(key), "Sending security key");

            if let Err(e) = self.transport.send(&frame).await {
                return Err(self.fail_transport(e));
            }

            let ack = match self
                .transport
                .receive(Some(can_id::KEY_ACK), self.config.ack_timeout())
                .await
            {
                Ok(ack) => ack,
                Err(e) => return Err(self.fail_transport(e)),
            };

            match ack.as_ref().and_then(|f| f.data().first().copied()) {
                Some(ACK_ACCEPTED) => {
                    tracing::info!(attempt, "Security key accepted");
                    let records = self.collect_metadata().await?;
                    self.state = HandshakeState::Done;
                    return Ok(KeyExchangeOutcome::Accepted {
                        records,
                        attempts: attempt,
                    });
                }
                Some(ACK_REJECTED) => {
                    tracing::warn!(attempt, "Security key rejected");
                }
                Some(other) => {
                    tracing::warn!(
                        attempt,
                        ack = format!("0x{:02X}", other),
                        "Unknown key acknowledgement"
                    );
                }
                None if ack.is_some() => {
                    tracing::warn!(attempt, "Empty key acknowledgement");
                }
                None => {
                    tracing::warn!(attempt, "No key acknowledgement");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.key_retry_delay()).await;
            }
        }

        tracing::error!(attempts, "Key exchange failed");
        self.state = HandshakeState::Failed;
        Ok(KeyExchangeOutcome::Rejected { attempts })
    }

    /// Decode metadata frames until the collection window closes
    async fn collect_metadata(&mut self) -> Result<Vec<MetadataRecord>, HandshakeError> {
        self.state = HandshakeState::MetadataCollection;
        let deadline = Instant::now() + self.config.metadata_window();
        let mut records = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match self.transport.receive(Some(can_id::METADATA), remaining).await {
                Ok(Some(frame)) => {
                    let record = metadata::decode(&frame);
                    tracing::info!(
                        tag = record.label(),
                        value = format!("0x{:X}", record.value),
                        "Metadata received"
                    );
                    records.push(record);
                }
                Ok(None) => break,
                Err(e) => return Err(self.fail_transport(e)),
            }
        }

        tracing::debug!(count = records.len(), "Metadata collection finished");
        Ok(records)
    }

    fn ensure_no_fault(&mut self) -> Result<(), HandshakeError> {
        if self.fault.is_raised() {
            self.state = HandshakeState::Failed;
            return Err(HandshakeError::Fault);
        }
        Ok(())
    }

    fn fail_transport(&mut self, e: TransportError) -> HandshakeError {
        tracing::error!(error = %e, state = ?self.state, "Transport error during handshake");
        self.fault.raise();
        self.state = HandshakeState::Failed;
        HandshakeError::Transport(e)
    }
}

/// A unit announces itself with its id in the first two bytes
fn unit_id_from(frame: &CanFrame) -> Option<u16> {
    if frame.id().raw() == can_id::STATUS {
        return None;
    }
    match frame.data() {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}
