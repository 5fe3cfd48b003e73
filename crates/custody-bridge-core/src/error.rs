use serde_json::{json, Value};
use thiserror::Error;

use crate::ports::PortError;

/// EIP-1193 provider error codes used when errors cross a JSON boundary.
pub const USER_REJECTED_CODE: i64 = 4001;
pub const DISCONNECTED_CODE: i64 = 4900;
pub const INTERNAL_ERROR_CODE: i64 = -32603;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("environment error: {0}")]
    Environment(String),
    #[error("user declined: {0}")]
    UserDeclined(String),
    #[error("remote error: {0}")]
    Remote(#[from] PortError),
    #[error("node rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
}

impl ProviderError {
    pub fn code(&self) -> i64 {
        match self {
            ProviderError::UserDeclined(_) => USER_REJECTED_CODE,
            ProviderError::Environment(_) => DISCONNECTED_CODE,
            ProviderError::Rpc { code, .. } => *code,
            ProviderError::Configuration(_) | ProviderError::Remote(_) => INTERNAL_ERROR_CODE,
        }
    }

    /// The bare message carried by the error, without the variant prefix
    /// `Display` adds. Node messages come back exactly as the node sent them.
    pub fn message(&self) -> String {
        match self {
            ProviderError::Configuration(m)
            | ProviderError::Environment(m)
            | ProviderError::UserDeclined(m) => m.clone(),
            ProviderError::Remote(e) => e.to_string(),
            ProviderError::Rpc { message, .. } => message.clone(),
        }
    }

    /// Renders the error as a JSON-RPC error object.
    pub fn to_rpc_error(&self) -> Value {
        let mut obj = json!({
            "code": self.code(),
            "message": self.message(),
        });
        if let ProviderError::Rpc {
            data: Some(data), ..
        } = self
        {
            obj["data"] = data.clone();
        }
        obj
    }
}
