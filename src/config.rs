use crate::types::address::NumberFormat;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Runtime configuration. Defaults first, then `WABOT_*` variables, then a bare `PORT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub loglevel: String,
    /// Where the session credential is persisted.
    pub session_file: PathBuf,
    /// Server-side file sent by `POST /send-media`.
    pub media_file: PathBuf,
    pub country_code: u16,
    pub address_suffix: String,
    pub gateway_url: Url,
    pub gateway_key: String,
    pub instance_name: String,
    /// Public URL the gateway posts lifecycle events to.
    pub webhook_url: Url,
    /// Shared secret expected in the webhook `key` query parameter.
    pub webhook_key: String,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9000,
            loglevel: "info".to_string(),
            session_file: PathBuf::from("./wabot-session.json"),
            media_file: PathBuf::from("./pp.jpeg"),
            country_code: 62,
            address_suffix: "@c.us".to_string(),
            gateway_url: Url::parse("http://127.0.0.1:8080").expect("static gateway url"),
            gateway_key: String::new(),
            instance_name: "wabot".to_string(),
            webhook_url: Url::parse("http://127.0.0.1:9000/webhook/gateway")
                .expect("static webhook url"),
            webhook_key: String::new(),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("WABOT_"))
            .merge(Env::raw().only(&["PORT"]))
    }

    pub fn from_env() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn number_format(&self) -> NumberFormat {
        NumberFormat::new(self.country_code, self.address_suffix.clone())
    }
}
