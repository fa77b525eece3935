use crate::error::BridgeError;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

/// Connection details shared by every gateway call.
#[derive(Debug, Clone)]
pub(super) struct GatewayContext {
    pub http: reqwest::Client,
    pub base: Url,
    pub api_key: String,
    pub instance: String,
}

impl GatewayContext {
    pub fn new(http: reqwest::Client, mut base: Url, api_key: String, instance: String) -> Self {
        // `Url::join` drops the last path segment unless it ends with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            http,
            base,
            api_key,
            instance,
        }
    }

    fn endpoint(&self, action: &str) -> Result<Url, BridgeError> {
        Ok(self.base.join(&format!("{action}/{}", self.instance))?)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct NumberCheck {
    #[serde(default)]
    pub exists: bool,
    pub jid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SendResponse {
    pub key: MessageKey,
    #[serde(rename = "messageTimestamp")]
    pub message_timestamp: Option<Value>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessageKey {
    pub id: String,
}

/// Stateless gateway REST calls.
pub(super) struct GatewayEndpoints;

impl GatewayEndpoints {
    /// Current connection state, or `None` when the instance does not exist.
    pub(super) async fn connection_state(
        ctx: &GatewayContext,
    ) -> Result<Option<String>, BridgeError> {
        let resp = ctx
            .http
            .get(ctx.endpoint("instance/connectionState")?)
            .header("apikey", &ctx.api_key)
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = ensure_success(resp).await?.json().await?;
        let state = body["instance"]["state"]
            .as_str()
            .or_else(|| body["state"].as_str())
            .unwrap_or("unknown")
            .to_string();
        debug!(instance = %ctx.instance, state = %state, "gateway connection state");
        Ok(Some(state))
    }

    pub(super) async fn create_instance(
        ctx: &GatewayContext,
        token: Option<&str>,
        webhook: &Url,
    ) -> Result<Value, BridgeError> {
        let mut body = json!({
            "instanceName": ctx.instance,
            "qrcode": true,
            "webhook": webhook.as_str(),
            "webhook_by_events": false,
            "events": ["QRCODE_UPDATED", "CONNECTION_UPDATE", "MESSAGES_UPSERT"],
        });
        if let Some(token) = token {
            body["token"] = Value::String(token.to_string());
        }

        let resp = ctx
            .http
            .post(ctx.base.join("instance/create")?)
            .header("apikey", &ctx.api_key)
            .json(&body)
            .send()
            .await?;
        let created: Value = ensure_success(resp).await?.json().await?;
        info!(instance = %ctx.instance, "gateway instance created");
        Ok(created)
    }

    pub(super) async fn connect_instance(ctx: &GatewayContext) -> Result<Value, BridgeError> {
        let resp = ctx
            .http
            .get(ctx.endpoint("instance/connect")?)
            .header("apikey", &ctx.api_key)
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    pub(super) async fn whatsapp_numbers(
        ctx: &GatewayContext,
        numbers: &[&str],
    ) -> Result<Vec<NumberCheck>, BridgeError> {
        let resp = ctx
            .http
            .post(ctx.endpoint("chat/whatsappNumbers")?)
            .header("apikey", &ctx.api_key)
            .json(&json!({ "numbers": numbers }))
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    pub(super) async fn send_text(
        ctx: &GatewayContext,
        body: &Value,
    ) -> Result<SendResponse, BridgeError> {
        Self::post_message(ctx, "message/sendText", body).await
    }

    pub(super) async fn send_media(
        ctx: &GatewayContext,
        body: &Value,
    ) -> Result<SendResponse, BridgeError> {
        Self::post_message(ctx, "message/sendMedia", body).await
    }

    async fn post_message(
        ctx: &GatewayContext,
        action: &str,
        body: &Value,
    ) -> Result<SendResponse, BridgeError> {
        let resp = ctx
            .http
            .post(ctx.endpoint(action)?)
            .header("apikey", &ctx.api_key)
            .json(body)
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }
}

/// Pull the raw pairing code out of a create/connect response.
pub(super) fn extract_qr_code(resp: &Value) -> Option<String> {
    resp["qrcode"]["code"]
        .as_str()
        .or_else(|| resp["code"].as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Instance token handed out on creation.
pub(super) fn extract_instance_token(resp: &Value) -> Option<String> {
    resp["hash"]["apikey"]
        .as_str()
        .or_else(|| resp["hash"].as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, BridgeError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Err(BridgeError::Gateway { status, body })
}
