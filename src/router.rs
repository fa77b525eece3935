use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;

use crate::config::Config;
use crate::handlers::{messages, status, webhook};
use crate::service::SessionHandle;

#[derive(Clone)]
pub struct BridgeState {
    pub session: SessionHandle,
    pub config: Arc<Config>,
}

impl BridgeState {
    pub fn new(session: SessionHandle, config: Config) -> Self {
        Self {
            session,
            config: Arc::new(config),
        }
    }
}

pub fn bridge_router(state: BridgeState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(status::index))
        .route("/ws", get(status::status_socket))
        .route("/session", get(status::session_state))
        .route("/send-message", post(messages::send_message))
        .route("/send-media", post(messages::send_media))
        .route(
            "/send-media-upload",
            post(messages::send_media_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/webhook/gateway", post(webhook::gateway_webhook))
        .with_state(state)
}
