use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Value>>,
}

impl RequestPayload {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: None,
            jsonrpc: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            params: Some(params),
            ..Self::new(method)
        }
    }

    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(index))
    }

    pub fn params_value(&self) -> Value {
        Value::Array(self.params.clone().unwrap_or_default())
    }
}

/// A single request or a batch, as accepted by the legacy `send` entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestEnvelope {
    Batch(Vec<RequestPayload>),
    Single(RequestPayload),
}

impl From<RequestPayload> for RequestEnvelope {
    fn from(payload: RequestPayload) -> Self {
        RequestEnvelope::Single(payload)
    }
}

impl From<Vec<RequestPayload>> for RequestEnvelope {
    fn from(batch: Vec<RequestPayload>) -> Self {
        RequestEnvelope::Batch(batch)
    }
}

/// One element of a batch result, shaped like a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub id: u64,
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

/// A cross-document message as delivered by the surface host.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub origin: String,
    pub data: Value,
}

impl ChannelMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    /// Decodes the message body. Unknown or malformed types yield `None`.
    pub fn frame_message(&self) -> Option<FrameMessage> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignStatus {
    Approved,
    Declined,
}

/// Messages exchanged with the custody service's embedded pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FrameMessage {
    #[serde(rename = "FCL::CHALLENGE::RESPONSE")]
    ChallengeResponse { code: String, addr: String },
    #[serde(rename = "FCL::CHALLENGE::CANCEL")]
    ChallengeCancel,
    #[serde(rename = "ETH:FRAME:READY")]
    Ready,
    #[serde(rename = "ETH:FRAME:READY:RESPONSE")]
    ReadyResponse {
        method: String,
        message: String,
        chain: String,
    },
    #[serde(rename = "ETH:FRAME:RESPONSE")]
    Response {
        status: SignStatus,
        #[serde(default)]
        signature: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthzStatus {
    Pending,
    Approved,
    Declined,
    #[serde(other)]
    Unknown,
}

impl AuthzStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthzStatus::Approved | AuthzStatus::Declined)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationStatus {
    pub status: AuthzStatus,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}
