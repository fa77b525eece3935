#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use wabot_bridge::BridgeError;
use wabot_bridge::config::Config;
use wabot_bridge::router::{BridgeState, bridge_router};
use wabot_bridge::service::{SessionHandle, SessionState, session_actor};
use wabot_bridge::store::SessionStore;
use wabot_bridge::transport::{EventSink, Transport, TransportEvent};
use wabot_bridge::types::{
    Address, DeliveryStatus, InboundMessage, MessageReceipt, ResolvedMedia, SessionCredential,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { to: String, body: String },
    Media { to: String, mime_type: String, len: usize, caption: Option<String> },
}

/// In-memory transport: pairs immediately and records what it was asked to send.
pub struct FakeTransport {
    pub registered: HashSet<String>,
    pub reach_ready: bool,
    pub fail_sends: bool,
    pub sent: Mutex<Vec<Sent>>,
}

impl FakeTransport {
    pub fn new(registered: &[&str]) -> Self {
        Self {
            registered: registered.iter().map(|s| s.to_string()).collect(),
            reach_ready: true,
            fail_sends: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn receipt(&self, to: &Address) -> Result<MessageReceipt, BridgeError> {
        if self.fail_sends {
            return Err(BridgeError::Gateway {
                status: axum::http::StatusCode::BAD_REQUEST,
                body: json!({"error": "upstream rejected"}),
            });
        }
        Ok(MessageReceipt {
            destination: to.clone(),
            message_id: format!("FAKE-{}", self.sent.lock().unwrap().len()),
            timestamp: Utc::now(),
            status: DeliveryStatus::Pending,
        })
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn initialize(
        &self,
        _credential: Option<SessionCredential>,
        events: EventSink,
    ) -> Result<(), BridgeError> {
        if self.reach_ready {
            events.emit(TransportEvent::Authenticated(SessionCredential::new(
                json!({"instance": "test", "token": "t"}),
            )));
            events.emit(TransportEvent::Ready);
        } else {
            events.emit(TransportEvent::PairingChallenge("2@pending".into()));
        }
        Ok(())
    }

    async fn is_registered(&self, address: &Address) -> Result<bool, BridgeError> {
        Ok(self.registered.contains(address.as_str()))
    }

    async fn send_text(&self, address: &Address, body: &str) -> Result<MessageReceipt, BridgeError> {
        let receipt = self.receipt(address)?;
        self.sent.lock().unwrap().push(Sent::Text {
            to: address.to_string(),
            body: body.to_string(),
        });
        Ok(receipt)
    }

    async fn send_media(
        &self,
        address: &Address,
        media: ResolvedMedia,
        caption: Option<&str>,
    ) -> Result<MessageReceipt, BridgeError> {
        let receipt = self.receipt(address)?;
        self.sent.lock().unwrap().push(Sent::Media {
            to: address.to_string(),
            mime_type: media.mime_type,
            len: media.data.len(),
            caption: caption.map(str::to_string),
        });
        Ok(receipt)
    }

    async fn reply(&self, to: &InboundMessage, body: &str) -> Result<MessageReceipt, BridgeError> {
        self.send_text(&to.chat, body).await
    }
}

pub struct Harness {
    pub app: Router,
    pub session: SessionHandle,
    pub transport: Arc<FakeTransport>,
    pub dir: TempDir,
}

impl Harness {
    pub fn media_path(&self) -> PathBuf {
        self.dir.path().join("pp.jpeg")
    }
}

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        session_file: dir.path().join("session.json"),
        media_file: dir.path().join("pp.jpeg"),
        webhook_key: "s3cret".to_string(),
        ..Config::default()
    }
}

/// Spawn a session on `transport`, start it, and wait until it settles.
pub async fn harness_with(
    transport: FakeTransport,
    tweak: impl FnOnce(&mut Config),
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    tweak(&mut config);

    let reach_ready = transport.reach_ready;
    let transport = Arc::new(transport);
    let session = session_actor::spawn(
        SessionStore::new(config.session_file.clone()),
        transport.clone(),
    )
    .await
    .unwrap();
    session.start();

    for _ in 0..200 {
        let state = session.state().await.unwrap();
        let settled = if reach_ready {
            state == SessionState::Ready
        } else {
            state == SessionState::AwaitingPairing
        };
        if settled {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let app = bridge_router(BridgeState::new(session.clone(), config));
    Harness {
        app,
        session,
        transport,
        dir,
    }
}

pub async fn harness(registered: &[&str]) -> Harness {
    harness_with(FakeTransport::new(registered), |_| {}).await
}
