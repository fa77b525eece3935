use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use crate::error::BridgeError;
use crate::router::BridgeState;

/// Check the webhook shared secret, passed as `?key=...`.
/// An empty configured key rejects everything.
pub fn ensure_authorized(expected: &str, query: Option<&str>) -> Result<(), BridgeError> {
    if expected.is_empty() {
        return Err(BridgeError::Unauthorized);
    }

    if let Some(qs) = query {
        for (k, v) in url::form_urlencoded::parse(qs.as_bytes()) {
            if k == "key" && bool::from(v.as_bytes().ct_eq(expected.as_bytes())) {
                return Ok(());
            }
        }
    }

    Err(BridgeError::Unauthorized)
}

#[derive(Debug, Clone, Copy)]
pub struct RequireWebhookKey;

impl FromRequestParts<BridgeState> for RequireWebhookKey {
    type Rejection = BridgeError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BridgeState,
    ) -> Result<Self, Self::Rejection> {
        ensure_authorized(&state.config.webhook_key, parts.uri.query())?;
        Ok(Self)
    }
}
