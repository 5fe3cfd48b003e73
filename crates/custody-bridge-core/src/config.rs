use serde::{Deserialize, Serialize};

use crate::chains::{ChainInfo, ChainTable};
use crate::error::ProviderError;

pub const RPC_ENV: &str = "RPC";
pub const SERVER_ENV: &str = "SERVER";
pub const APP_ID_ENV: &str = "APP_ID";

/// Chain identifier as accepted from callers: a number, or a decimal or
/// `0x`-prefixed hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainIdInput {
    Number(u64),
    Text(String),
}

impl From<u64> for ChainIdInput {
    fn from(value: u64) -> Self {
        ChainIdInput::Number(value)
    }
}

impl From<&str> for ChainIdInput {
    fn from(value: &str) -> Self {
        ChainIdInput::Text(value.to_owned())
    }
}

impl From<String> for ChainIdInput {
    fn from(value: String) -> Self {
        ChainIdInput::Text(value)
    }
}

impl ChainIdInput {
    pub fn normalize(&self) -> Result<u64, ProviderError> {
        match self {
            ChainIdInput::Number(n) => Ok(*n),
            ChainIdInput::Text(raw) => parse_chain_id_str(raw.trim()),
        }
    }
}

fn parse_chain_id_str(raw: &str) -> Result<u64, ProviderError> {
    if raw.is_empty() {
        return Err(ProviderError::Configuration("'chainId' is required".to_owned()));
    }
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| {
            ProviderError::Configuration(format!("invalid hex 'chainId' {raw}: {e}"))
        })
    } else {
        raw.parse()
            .map_err(|e| ProviderError::Configuration(format!("invalid 'chainId' {raw}: {e}")))
    }
}

/// Constructor arguments for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOptions {
    pub chain_id: ChainIdInput,
    #[serde(default)]
    pub rpc: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
}

impl ProviderOptions {
    pub fn new(chain_id: impl Into<ChainIdInput>) -> Self {
        Self {
            chain_id: chain_id.into(),
            rpc: None,
            server: None,
            app_id: None,
        }
    }

    pub fn rpc(mut self, rpc: impl Into<String>) -> Self {
        self.rpc = Some(rpc.into());
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }
}

/// Process-level overrides. These win over constructor arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub rpc: Option<String>,
    pub server: Option<String>,
    pub app_id: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            rpc: read_env(RPC_ENV),
            server: read_env(SERVER_ENV),
            app_id: read_env(APP_ID_ENV),
        }
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub chain_id: u64,
    pub chain: ChainInfo,
    pub node_endpoint: String,
    pub service_endpoint: Option<String>,
    pub app_id: Option<String>,
}

impl ProviderConfig {
    pub fn resolve(
        options: &ProviderOptions,
        env: &EnvOverrides,
        table: &ChainTable,
    ) -> Result<Self, ProviderError> {
        let chain_id = options.chain_id.normalize()?;
        let chain = table
            .lookup(chain_id)
            .cloned()
            .ok_or_else(|| ProviderError::Configuration(format!("unsupported 'chainId': {chain_id}")))?;

        let node_endpoint = first_present([
            env.rpc.as_deref(),
            options.rpc.as_deref(),
            chain.default_rpc.as_deref(),
        ])
        .ok_or_else(|| {
            ProviderError::Configuration(format!("'rpc' is required for chain {}", chain.name))
        })?;

        let service_endpoint = first_present([
            env.server.as_deref(),
            options.server.as_deref(),
            chain.default_service.as_deref(),
        ])
        .map(|s| s.trim_end_matches('/').to_owned());

        let app_id = first_present([env.app_id.as_deref(), options.app_id.as_deref()]);

        Ok(Self {
            chain_id,
            chain,
            node_endpoint,
            service_endpoint,
            app_id,
        })
    }

    pub fn network_id(&self) -> u64 {
        self.chain.network_id.unwrap_or(self.chain_id)
    }

    pub fn chain_name(&self) -> &str {
        &self.chain.name
    }

    pub fn service_endpoint(&self) -> Result<&str, ProviderError> {
        self.service_endpoint
            .as_deref()
            .ok_or_else(|| ProviderError::Configuration("'server' is not configured".to_owned()))
    }
}

fn first_present<const N: usize>(candidates: [Option<&str>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(str::to_owned)
}
