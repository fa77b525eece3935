//! Seam between the session manager and whatever drives the messaging platform.
//!
//! A [`Transport`] performs the actual platform calls and reports lifecycle
//! changes through an [`EventSink`]. The session actor owns the sink's
//! receiving end and turns those events into state transitions.

pub mod gateway;

use crate::error::BridgeError;
use crate::types::{Address, InboundMessage, MessageReceipt, ResolvedMedia, SessionCredential};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

pub use gateway::EvolutionGateway;

/// Lifecycle events as reported by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A pairing code to be scanned; may repeat until paired.
    PairingChallenge(String),
    /// The session is authenticated; the credential should be persisted.
    Authenticated(SessionCredential),
    Ready,
    /// The connection dropped without an authentication failure. The transport
    /// reconnects, possibly via a fresh pairing challenge.
    Disconnected(String),
    AuthFailure(String),
    Message(InboundMessage),
}

/// Sending half handed to a transport so it can report events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { tx }
    }

    /// Returns false once the session actor is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the session, restoring `credential` when one is available.
    /// Pairing and readiness are reported through `events`, not the return value.
    async fn initialize(
        &self,
        credential: Option<SessionCredential>,
        events: EventSink,
    ) -> Result<(), BridgeError>;

    async fn is_registered(&self, address: &Address) -> Result<bool, BridgeError>;

    async fn send_text(&self, address: &Address, body: &str)
    -> Result<MessageReceipt, BridgeError>;

    async fn send_media(
        &self,
        address: &Address,
        media: ResolvedMedia,
        caption: Option<&str>,
    ) -> Result<MessageReceipt, BridgeError>;

    /// Reply to an inbound message, quoting it.
    async fn reply(&self, to: &InboundMessage, body: &str) -> Result<MessageReceipt, BridgeError>;

    /// Translate a pushed webhook payload into events. Transports that do not
    /// receive webhooks keep the default.
    fn translate_webhook(&self, _payload: &Value) -> Vec<TransportEvent> {
        Vec::new()
    }
}
