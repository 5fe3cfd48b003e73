use async_trait::async_trait;
use serde_json::Value;

use custody_bridge_core::{NodePort, PortError, RequestPayload};

/// JSON-RPC over HTTP POST to the configured node.
#[derive(Debug, Clone)]
pub struct NodeRpcAdapter {
    endpoint: String,
    client: reqwest::Client,
}

impl NodeRpcAdapter {
    pub fn new(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait(?Send)]
impl NodePort for NodeRpcAdapter {
    async fn call(&self, payload: &RequestPayload) -> Result<Value, PortError> {
        tracing::debug!(method = %payload.method, endpoint = %self.endpoint, "node call");
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("node request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("node json decode failed: {e}")))?;
        // JSON-RPC errors may ride on non-2xx statuses; the broker reads them.
        if !status.is_success() && body.get("error").is_none() {
            return Err(PortError::Transport(format!("node status {status}: {body}")));
        }
        Ok(body)
    }
}
