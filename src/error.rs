use axum::extract::multipart::MultipartError;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Rejection sent back when the destination has no account on the platform.
pub const NOT_REGISTERED_MESSAGE: &str = "nomor anda belom terdaftar pada aplikasi wa";

#[derive(Debug, ThisError)]
pub enum BridgeError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(BTreeMap<String, String>),

    #[error("destination is not registered")]
    NotRegistered,

    #[error("session is not ready (state: {state})")]
    NotReady { state: String },

    #[error("gateway responded with status {status}")]
    Gateway { status: StatusCode, body: Value },

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl BridgeError {
    /// Errors worth retrying while the gateway is still coming up.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Reqwest(e) => e.is_connect() || e.is_timeout(),
            BridgeError::Gateway { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// Response envelope shared by every API endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: bool,
    pub response: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(response: T) -> Self {
        Self {
            status: true,
            response,
        }
    }

    pub fn failed(response: T) -> Self {
        Self {
            status: false,
            response,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        let (status, response) = match self {
            BridgeError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::to_value(fields).unwrap_or(Value::Null),
            ),
            BridgeError::NotRegistered => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Value::String(NOT_REGISTERED_MESSAGE.to_string()),
            ),
            BridgeError::NotReady { state } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Value::String(format!("session is not ready ({state})")),
            ),
            BridgeError::Gateway { body, .. } => (StatusCode::INTERNAL_SERVER_ERROR, body),
            BridgeError::Multipart(e) => (e.status(), Value::String(e.body_text())),
            BridgeError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Value::String("invalid or missing key".to_string()),
            ),
            e @ (BridgeError::Reqwest(_)
            | BridgeError::UrlParse(_)
            | BridgeError::Json(_)
            | BridgeError::Io(_)
            | BridgeError::RactorError(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Value::String(e.to_string()))
            }
        };
        (status, Json(ApiResponse::failed(response))).into_response()
    }
}
