use crate::error::BridgeError;
use crate::types::address::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stable confirmation returned for every successful send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub destination: Address,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    ServerAck,
    DeliveryAck,
    Read,
    Played,
    Error,
    Unknown,
}

impl DeliveryStatus {
    /// Map the gateway's upper-case ack names.
    pub fn from_gateway(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "SERVER_ACK" => Self::ServerAck,
            "DELIVERY_ACK" => Self::DeliveryAck,
            "READ" => Self::Read,
            "PLAYED" => Self::Played,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

/// A message received from the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    /// Chat the message arrived in; replies go here.
    pub chat: Address,
    pub push_name: Option<String>,
    pub body: String,
    pub from_me: bool,
    pub timestamp: DateTime<Utc>,
}

/// Media to send: either the fixed server-side file or an uploaded one.
#[derive(Debug, Clone)]
pub enum MediaPayload {
    File(PathBuf),
    Upload {
        mime_type: String,
        data: Vec<u8>,
        filename: String,
    },
}

/// Media with bytes in hand, ready for the transport.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub filename: String,
}

impl ResolvedMedia {
    /// Coarse media category used by the gateway API.
    pub fn media_kind(&self) -> &'static str {
        match self.mime_type.split('/').next() {
            Some("image") => "image",
            Some("video") => "video",
            Some("audio") => "audio",
            _ => "document",
        }
    }
}

impl MediaPayload {
    pub async fn resolve(self) -> Result<ResolvedMedia, BridgeError> {
        match self {
            MediaPayload::File(path) => {
                let data = tokio::fs::read(&path).await?;
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("media")
                    .to_string();
                Ok(ResolvedMedia {
                    mime_type: mime_from_path(&path).to_string(),
                    data,
                    filename,
                })
            }
            MediaPayload::Upload {
                mime_type,
                data,
                filename,
            } => Ok(ResolvedMedia {
                mime_type,
                data,
                filename,
            }),
        }
    }
}

fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("3gp") => "video/3gpp",
        Some("mp3") => "audio/mpeg",
        Some("ogg" | "opus") => "audio/ogg",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
