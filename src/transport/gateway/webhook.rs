use crate::types::{Address, InboundMessage};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Gateway webhook payload, reduced to what the session cares about.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum GatewayEvent {
    Qr(String),
    Open {
        owner: Option<String>,
        token: Option<String>,
    },
    Closed {
        status_reason: Option<i64>,
    },
    Messages(Vec<InboundMessage>),
    Ignored,
}

pub(super) fn parse(payload: &Value, instance: &str) -> GatewayEvent {
    if let Some(from) = payload["instance"].as_str()
        && from != instance
    {
        return GatewayEvent::Ignored;
    }

    let data = &payload["data"];
    match payload["event"].as_str().unwrap_or("") {
        "qrcode.updated" => data["qrcode"]["code"]
            .as_str()
            .filter(|c| !c.is_empty())
            .map(|c| GatewayEvent::Qr(c.to_string()))
            .unwrap_or(GatewayEvent::Ignored),
        "connection.update" => match data["state"].as_str().unwrap_or("") {
            "open" | "connected" => GatewayEvent::Open {
                owner: payload["sender"]
                    .as_str()
                    .or_else(|| data["wuid"].as_str())
                    .map(str::to_string),
                token: payload["apikey"].as_str().map(str::to_string),
            },
            "close" => GatewayEvent::Closed {
                status_reason: data["statusReason"].as_i64(),
            },
            _ => GatewayEvent::Ignored,
        },
        "messages.upsert" => {
            let messages: Vec<InboundMessage> = match data.as_array() {
                Some(items) => items.iter().filter_map(parse_message).collect(),
                None => parse_message(data).into_iter().collect(),
            };
            if messages.is_empty() {
                GatewayEvent::Ignored
            } else {
                GatewayEvent::Messages(messages)
            }
        }
        _ => GatewayEvent::Ignored,
    }
}

fn parse_message(msg: &Value) -> Option<InboundMessage> {
    let key = &msg["key"];
    let body = msg["message"]["conversation"]
        .as_str()
        .or_else(|| msg["message"]["extendedTextMessage"]["text"].as_str())
        .filter(|t| !t.is_empty())?;

    Some(InboundMessage {
        id: key["id"].as_str()?.to_string(),
        chat: Address::new(key["remoteJid"].as_str()?),
        push_name: msg["pushName"].as_str().map(str::to_string),
        body: body.to_string(),
        from_me: key["fromMe"].as_bool().unwrap_or(false),
        timestamp: parse_unix(&msg["messageTimestamp"]).unwrap_or_else(Utc::now),
    })
}

/// Unix seconds, sent either as a number or a numeric string.
pub(super) fn parse_unix(v: &Value) -> Option<DateTime<Utc>> {
    let secs = v
        .as_i64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))?;
    DateTime::from_timestamp(secs, 0)
}
