use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque proof of an authenticated session, as issued by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCredential(Value);

impl SessionCredential {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Convenience accessor for string fields inside the blob.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}
