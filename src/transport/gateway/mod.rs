//! Transport backed by a messaging gateway sidecar (Evolution API).
//!
//! Layout:
//! - `endpoints.rs`: stateless REST calls against the gateway
//! - `webhook.rs`: parsing of the events the gateway pushes back

mod endpoints;
mod webhook;

use self::endpoints::{GatewayContext, GatewayEndpoints, SendResponse, extract_instance_token, extract_qr_code};
use self::webhook::GatewayEvent;
use super::{EventSink, Transport, TransportEvent};
use crate::config::Config;
use crate::error::BridgeError;
use crate::types::{
    Address, DeliveryStatus, InboundMessage, MessageReceipt, ResolvedMedia, SessionCredential,
};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

fn init_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(5)
        .with_jitter()
}

pub struct EvolutionGateway {
    ctx: GatewayContext,
    webhook: Url,
    /// Instance token, restored from the credential or issued on creation.
    token: Mutex<Option<String>>,
}

impl EvolutionGateway {
    pub fn new(config: &Config) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("wabot-bridge/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        let mut webhook = config.webhook_url.clone();
        if !config.webhook_key.is_empty() {
            webhook
                .query_pairs_mut()
                .append_pair("key", &config.webhook_key);
        }

        Ok(Self {
            ctx: GatewayContext::new(
                http,
                config.gateway_url.clone(),
                config.gateway_key.clone(),
                config.instance_name.clone(),
            ),
            webhook,
            token: Mutex::new(None),
        })
    }

    fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn remember_token(&self, token: Option<String>) {
        if let (Some(token), Ok(mut slot)) = (token, self.token.lock()) {
            *slot = Some(token);
        }
    }

    fn credential(&self, owner: Option<String>) -> SessionCredential {
        SessionCredential::new(json!({
            "instance": self.ctx.instance,
            "token": self.token(),
            "owner": owner,
            "authenticatedAt": Utc::now().to_rfc3339(),
        }))
    }

    async fn connection_state_with_retry(&self) -> Result<Option<String>, BridgeError> {
        (|| async { GatewayEndpoints::connection_state(&self.ctx).await })
            .retry(init_retry_policy())
            .when(|e: &BridgeError| e.is_retryable())
            .notify(|err, dur: Duration| {
                warn!("gateway not reachable ({}), retrying in {:?}", err, dur);
            })
            .await
    }

    fn text_body(number: &str, text: &str, quoted: Option<&InboundMessage>) -> Value {
        let mut options = json!({ "delay": 0 });
        if let Some(msg) = quoted {
            options["quoted"] = json!({
                "key": { "remoteJid": msg.chat.as_str(), "fromMe": msg.from_me, "id": msg.id },
                "message": { "conversation": msg.body },
            });
        }
        json!({
            "number": number,
            "options": options,
            "textMessage": { "text": text },
        })
    }

    fn media_body(number: &str, media: &ResolvedMedia, caption: Option<&str>) -> Value {
        json!({
            "number": number,
            "options": { "delay": 0 },
            "mediaMessage": {
                "mediatype": media.media_kind(),
                "fileName": media.filename,
                "caption": caption.unwrap_or_default(),
                "media": base64::engine::general_purpose::STANDARD.encode(&media.data),
            },
        })
    }
}

impl SendResponse {
    fn into_receipt(self, destination: &Address) -> MessageReceipt {
        MessageReceipt {
            destination: destination.clone(),
            message_id: self.key.id,
            timestamp: self
                .message_timestamp
                .as_ref()
                .and_then(webhook::parse_unix)
                .unwrap_or_else(Utc::now),
            status: self
                .status
                .as_deref()
                .map(DeliveryStatus::from_gateway)
                .unwrap_or(DeliveryStatus::Pending),
        }
    }
}

#[async_trait]
impl Transport for EvolutionGateway {
    async fn initialize(
        &self,
        credential: Option<SessionCredential>,
        events: EventSink,
    ) -> Result<(), BridgeError> {
        if let Some(cred) = credential.as_ref() {
            self.remember_token(cred.field("token").map(str::to_string));
        }

        let state = self.connection_state_with_retry().await?;
        info!(
            instance = %self.ctx.instance,
            state = state.as_deref().unwrap_or("<missing>"),
            restored = credential.is_some(),
            "gateway reachable"
        );

        let challenge = match state.as_deref() {
            None => {
                let token = self.token();
                let created =
                    GatewayEndpoints::create_instance(&self.ctx, token.as_deref(), &self.webhook)
                        .await?;
                self.remember_token(extract_instance_token(&created));
                extract_qr_code(&created)
            }
            Some("open") => {
                let owner = credential
                    .as_ref()
                    .and_then(|c| c.field("owner"))
                    .map(str::to_string);
                events.emit(TransportEvent::Authenticated(self.credential(owner)));
                events.emit(TransportEvent::Ready);
                return Ok(());
            }
            Some(_) => extract_qr_code(&GatewayEndpoints::connect_instance(&self.ctx).await?),
        };

        match challenge {
            Some(code) => {
                events.emit(TransportEvent::PairingChallenge(code));
            }
            None => debug!("no pairing code in gateway response; waiting for webhook"),
        }
        Ok(())
    }

    async fn is_registered(&self, address: &Address) -> Result<bool, BridgeError> {
        let checks = GatewayEndpoints::whatsapp_numbers(&self.ctx, &[address.user()]).await?;
        debug!(
            address = %address,
            jid = checks.first().and_then(|c| c.jid.as_deref()).unwrap_or("-"),
            "registration checked"
        );
        Ok(checks.iter().any(|c| c.exists))
    }

    async fn send_text(
        &self,
        address: &Address,
        body: &str,
    ) -> Result<MessageReceipt, BridgeError> {
        let payload = Self::text_body(address.user(), body, None);
        let resp = GatewayEndpoints::send_text(&self.ctx, &payload).await?;
        Ok(resp.into_receipt(address))
    }

    async fn send_media(
        &self,
        address: &Address,
        media: ResolvedMedia,
        caption: Option<&str>,
    ) -> Result<MessageReceipt, BridgeError> {
        let payload = Self::media_body(address.user(), &media, caption);
        let resp = GatewayEndpoints::send_media(&self.ctx, &payload).await?;
        Ok(resp.into_receipt(address))
    }

    async fn reply(&self, to: &InboundMessage, body: &str) -> Result<MessageReceipt, BridgeError> {
        let payload = Self::text_body(to.chat.as_str(), body, Some(to));
        let resp = GatewayEndpoints::send_text(&self.ctx, &payload).await?;
        Ok(resp.into_receipt(&to.chat))
    }

    fn translate_webhook(&self, payload: &Value) -> Vec<TransportEvent> {
        match webhook::parse(payload, &self.ctx.instance) {
            GatewayEvent::Qr(code) => vec![TransportEvent::PairingChallenge(code)],
            GatewayEvent::Open { owner, token } => {
                if self.token().is_none() {
                    self.remember_token(token);
                }
                vec![
                    TransportEvent::Authenticated(self.credential(owner)),
                    TransportEvent::Ready,
                ]
            }
            GatewayEvent::Closed {
                status_reason: Some(reason @ (401 | 403)),
            } => vec![TransportEvent::AuthFailure(format!(
                "gateway closed the session (status {reason})"
            ))],
            GatewayEvent::Closed { status_reason } => {
                warn!(?status_reason, "gateway connection closed");
                let reason = match status_reason {
                    Some(code) => format!("gateway closed the connection (status {code})"),
                    None => "gateway closed the connection".to_string(),
                };
                vec![TransportEvent::Disconnected(reason)]
            }
            GatewayEvent::Messages(msgs) => msgs.into_iter().map(TransportEvent::Message).collect(),
            GatewayEvent::Ignored => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn config_for(server_url: &str) -> Config {
        Config {
            gateway_url: Url::parse(server_url).unwrap(),
            gateway_key: "gw-key".into(),
            webhook_key: "hook".into(),
            ..Config::default()
        }
    }

    #[test]
    fn webhook_url_carries_the_key() {
        let gw = EvolutionGateway::new(&config_for("http://127.0.0.1:1")).unwrap();
        assert_eq!(
            gw.webhook.as_str(),
            "http://127.0.0.1:9000/webhook/gateway?key=hook"
        );
    }

    #[test]
    fn unauthorized_close_is_an_auth_failure() {
        let gw = EvolutionGateway::new(&config_for("http://127.0.0.1:1")).unwrap();
        let events = gw.translate_webhook(&json!({
            "event": "connection.update",
            "instance": "wabot",
            "data": {"state": "close", "statusReason": 401}
        }));
        assert!(matches!(events.as_slice(), [TransportEvent::AuthFailure(_)]));
    }

    #[test]
    fn other_close_is_a_disconnect() {
        let gw = EvolutionGateway::new(&config_for("http://127.0.0.1:1")).unwrap();
        let events = gw.translate_webhook(&json!({
            "event": "connection.update",
            "instance": "wabot",
            "data": {"state": "close", "statusReason": 428}
        }));
        let [TransportEvent::Disconnected(reason)] = events.as_slice() else {
            panic!("unexpected events: {events:?}");
        };
        assert!(reason.contains("428"));
    }

    #[test]
    fn open_webhook_authenticates_then_readies() {
        let gw = EvolutionGateway::new(&config_for("http://127.0.0.1:1")).unwrap();
        let events = gw.translate_webhook(&json!({
            "event": "connection.update",
            "instance": "wabot",
            "apikey": "inst-token",
            "sender": "628123@s.whatsapp.net",
            "data": {"state": "open"}
        }));
        let [TransportEvent::Authenticated(cred), TransportEvent::Ready] = events.as_slice() else {
            panic!("unexpected events: {events:?}");
        };
        assert_eq!(cred.field("token"), Some("inst-token"));
        assert_eq!(cred.field("owner"), Some("628123@s.whatsapp.net"));
        assert_eq!(cred.field("instance"), Some("wabot"));
    }

    #[tokio::test]
    async fn send_text_maps_gateway_response_to_receipt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/message/sendText/wabot")
            .match_header("apikey", "gw-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "number": "628123",
                "textMessage": {"text": "hello"}
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"key":{"remoteJid":"628123@s.whatsapp.net","fromMe":true,"id":"BAE5"},"messageTimestamp":"1700000000","status":"PENDING"}"#,
            )
            .create_async()
            .await;

        let gw = EvolutionGateway::new(&config_for(&server.url())).unwrap();
        let receipt = gw
            .send_text(&Address::new("628123@c.us"), "hello")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(receipt.message_id, "BAE5");
        assert_eq!(receipt.destination.as_str(), "628123@c.us");
        assert_eq!(receipt.status, DeliveryStatus::Pending);
        assert_eq!(receipt.timestamp.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn gateway_failure_keeps_the_raw_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/message/sendText/wabot")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":400,"error":"Bad Request","response":{"message":["not a number"]}}"#)
            .create_async()
            .await;

        let gw = EvolutionGateway::new(&config_for(&server.url())).unwrap();
        let err = gw
            .send_text(&Address::new("x@c.us"), "hello")
            .await
            .unwrap_err();

        match err {
            BridgeError::Gateway { status, body } => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(body["error"], "Bad Request");
            }
            other => panic!("expected gateway error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn registration_check_reads_exists_flag() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/whatsappNumbers/wabot")
            .match_body(mockito::Matcher::Json(json!({"numbers": ["628123"]})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"exists":true,"jid":"628123@s.whatsapp.net","number":"628123"}]"#)
            .create_async()
            .await;

        let gw = EvolutionGateway::new(&config_for(&server.url())).unwrap();
        assert!(gw.is_registered(&Address::new("628123@c.us")).await.unwrap());
    }

    #[tokio::test]
    async fn missing_instance_is_created_and_challenge_emitted() {
        let mut server = mockito::Server::new_async().await;
        let _state = server
            .mock("GET", "/instance/connectionState/wabot")
            .with_status(404)
            .create_async()
            .await;
        let _create = server
            .mock("POST", "/instance/create")
            .match_body(mockito::Matcher::PartialJson(json!({
                "instanceName": "wabot",
                "webhook": "http://127.0.0.1:9000/webhook/gateway?key=hook"
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"instance":{"instanceName":"wabot"},"hash":{"apikey":"issued"},"qrcode":{"code":"2@pair","base64":""}}"#)
            .create_async()
            .await;

        let gw = EvolutionGateway::new(&config_for(&server.url())).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        gw.initialize(None, EventSink::new(tx)).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::PairingChallenge("2@pair".into()))
        );
        assert_eq!(gw.token().as_deref(), Some("issued"));
    }

    #[tokio::test]
    async fn open_instance_restores_without_pairing() {
        let mut server = mockito::Server::new_async().await;
        let _state = server
            .mock("GET", "/instance/connectionState/wabot")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"instance":{"instanceName":"wabot","state":"open"}}"#)
            .create_async()
            .await;

        let gw = EvolutionGateway::new(&config_for(&server.url())).unwrap();
        let restored = SessionCredential::new(json!({"token": "kept", "owner": "628@s.whatsapp.net"}));
        let (tx, mut rx) = mpsc::unbounded_channel();
        gw.initialize(Some(restored), EventSink::new(tx)).await.unwrap();

        let Some(TransportEvent::Authenticated(cred)) = rx.recv().await else {
            panic!("expected authenticated");
        };
        assert_eq!(cred.field("token"), Some("kept"));
        assert_eq!(cred.field("owner"), Some("628@s.whatsapp.net"));
        assert_eq!(rx.recv().await, Some(TransportEvent::Ready));
    }
}
