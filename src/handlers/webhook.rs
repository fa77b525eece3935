use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::middleware::auth::RequireWebhookKey;
use crate::router::BridgeState;

/// POST /webhook/gateway: lifecycle and message events pushed by the gateway.
pub async fn gateway_webhook(
    _: RequireWebhookKey,
    State(state): State<BridgeState>,
    Json(payload): Json<Value>,
) -> StatusCode {
    let events = state.session.transport().translate_webhook(&payload);
    debug!(
        event = payload.get("event").and_then(serde_json::Value::as_str).unwrap_or("<none>"),
        translated = events.len(),
        "gateway webhook"
    );
    for event in events {
        state.session.dispatch(event);
    }
    StatusCode::OK
}
