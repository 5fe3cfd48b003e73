use std::time::Duration;

use custody_bridge_core::{EnvOverrides, PortError};

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub http_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Truthy property on `window.ethereum` marking a provider that already
    /// speaks to the custody service.
    pub host_provider_marker: String,
    pub env: EnvOverrides,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            http_timeout_ms: 15_000,
            poll_interval_ms: 1_000,
            host_provider_marker: "isBlocto".to_owned(),
            env: EnvOverrides::default(),
        }
    }
}

impl AdapterConfig {
    pub fn from_env() -> Self {
        Self {
            env: EnvOverrides::from_env(),
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn http_client(&self) -> Result<reqwest::Client, PortError> {
        let builder = reqwest::Client::builder();
        // The fetch backend has no request timeout.
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(self.http_timeout());
        builder
            .build()
            .map_err(|e| PortError::Transport(format!("failed to build http client: {e}")))
    }
}
