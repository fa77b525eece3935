use axum::{
    Json,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{Html, IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures::{Sink, SinkExt, StreamExt};
use qrcode::{QrCode, render::svg};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ApiResponse, BridgeError};
use crate::router::BridgeState;
use crate::service::{SessionEvent, SessionState, Subscription};

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub const CONNECTING: &str = "Connecting";
pub const QR_RECEIVED: &str = "QR code Received, scan please!";
pub const AUTHENTICATED: &str = "Wabot is authenticated!";
pub const READY: &str = "Wabot is ready!";

/// One frame on the live status channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusFrame {
    pub event: &'static str,
    pub data: String,
}

impl StatusFrame {
    fn new(event: &'static str, data: impl Into<String>) -> Self {
        Self {
            event,
            data: data.into(),
        }
    }

    fn message(data: impl Into<String>) -> Self {
        Self::new("message", data)
    }
}

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /session
pub async fn session_state(
    State(state): State<BridgeState>,
) -> Result<Json<ApiResponse<SessionState>>, BridgeError> {
    Ok(Json(ApiResponse::ok(state.session.state().await?)))
}

/// GET /ws
pub async fn status_socket(State(state): State<BridgeState>, ws: WebSocketUpgrade) -> Response {
    // Subscribe before the upgrade so nothing published during the handshake is lost.
    let subscription = state.session.subscribe();
    ws.on_upgrade(move |socket| stream_status(socket, subscription))
        .into_response()
}

async fn stream_status(socket: WebSocket, mut subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();

    if send_frame(&mut sender, &StatusFrame::message(CONNECTING))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            event = subscription.recv() => {
                let Some(event) = event else { break };
                for frame in frames_for(&event) {
                    if send_frame(&mut sender, &frame).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    debug!("status client disconnected");
    subscription.cancel();
}

async fn send_frame<S>(sender: &mut S, frame: &StatusFrame) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to encode status frame");
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

/// Frames pushed to status clients for a session event, in order.
pub fn frames_for(event: &SessionEvent) -> Vec<StatusFrame> {
    match event {
        SessionEvent::PairingChallenge { code } => {
            let mut frames = Vec::with_capacity(2);
            match qr_data_url(code) {
                Ok(url) => frames.push(StatusFrame::new("qr", url)),
                Err(e) => warn!(error = %e, "failed to render pairing code"),
            }
            frames.push(StatusFrame::message(QR_RECEIVED));
            frames
        }
        SessionEvent::Authenticated => vec![
            StatusFrame::new("authenticated", AUTHENTICATED),
            StatusFrame::message(AUTHENTICATED),
        ],
        SessionEvent::Ready => vec![
            StatusFrame::new("ready", READY),
            StatusFrame::message(READY),
        ],
        SessionEvent::Disconnected { reason } => {
            vec![StatusFrame::message(format!("Wabot is disconnected: {reason}"))]
        }
        SessionEvent::AuthenticationFailed { reason } => {
            vec![StatusFrame::message(format!("Authentication failure: {reason}"))]
        }
        SessionEvent::Message(_) => Vec::new(),
    }
}

/// Render a pairing code as an SVG image data URL.
pub fn qr_data_url(code: &str) -> Result<String, qrcode::types::QrError> {
    let image = QrCode::new(code.as_bytes())?
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image)
    ))
}
