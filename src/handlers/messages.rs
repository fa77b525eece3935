use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

use crate::error::{ApiResponse, BridgeError};
use crate::middleware::send_request::SendBody;
use crate::router::BridgeState;
use crate::types::{MediaPayload, MessageReceipt};

const INVALID_VALUE: &str = "Invalid value";

type ReceiptResponse = Json<ApiResponse<MessageReceipt>>;

#[derive(Debug, Default, Deserialize)]
pub struct SendMessageBody {
    pub number: Option<Value>,
    pub message: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendMediaBody {
    pub number: Option<Value>,
    pub caption: Option<Value>,
}

/// Non-empty string (or number) field value.
fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Collect required fields, reporting every one that is missing.
fn require<const N: usize>(fields: [(&str, Option<String>); N]) -> Result<[String; N], BridgeError> {
    let mut errors = BTreeMap::new();
    for (name, value) in &fields {
        if value.is_none() {
            errors.insert(name.to_string(), INVALID_VALUE.to_string());
        }
    }
    if !errors.is_empty() {
        return Err(BridgeError::Validation(errors));
    }
    Ok(fields.map(|(_, v)| v.unwrap_or_default()))
}

/// POST /send-message
pub async fn send_message(
    State(state): State<BridgeState>,
    SendBody(body): SendBody<SendMessageBody>,
) -> Result<ReceiptResponse, BridgeError> {
    let [number, message] = require([
        ("number", text_field(body.number.as_ref())),
        ("message", text_field(body.message.as_ref())),
    ])?;

    let address = state.config.number_format().format(&number);
    if !state.session.is_registered(&address).await? {
        info!(to = %address, "rejected send to unregistered number");
        return Err(BridgeError::NotRegistered);
    }

    let receipt = state.session.send_text(&address, &message).await?;
    Ok(Json(ApiResponse::ok(receipt)))
}

/// POST /send-media: sends the configured server-side file.
pub async fn send_media(
    State(state): State<BridgeState>,
    SendBody(body): SendBody<SendMediaBody>,
) -> Result<ReceiptResponse, BridgeError> {
    let [number] = require([("number", text_field(body.number.as_ref()))])?;
    let caption = text_field(body.caption.as_ref());

    let address = state.config.number_format().format(&number);
    let media = MediaPayload::File(state.config.media_file.clone());
    let receipt = state
        .session
        .send_media(&address, media, caption.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok(receipt)))
}

/// POST /send-media-upload: multipart `number`, `caption`, `file`.
pub async fn send_media_upload(
    State(state): State<BridgeState>,
    mut multipart: Multipart,
) -> Result<ReceiptResponse, BridgeError> {
    let mut number = None;
    let mut caption = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "number" => number = Some(field.text().await?).filter(|s| !s.is_empty()),
            "caption" => caption = Some(field.text().await?).filter(|s| !s.is_empty()),
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                file = Some(MediaPayload::Upload {
                    mime_type,
                    data: data.to_vec(),
                    filename,
                });
            }
            _ => {}
        }
    }

    let mut errors = BTreeMap::new();
    if number.is_none() {
        errors.insert("number".to_string(), INVALID_VALUE.to_string());
    }
    if file.is_none() {
        errors.insert("file".to_string(), INVALID_VALUE.to_string());
    }
    let (Some(number), Some(media)) = (number, file) else {
        return Err(BridgeError::Validation(errors));
    };

    let address = state.config.number_format().format(&number);
    let receipt = state
        .session
        .send_media(&address, media, caption.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok(receipt)))
}
