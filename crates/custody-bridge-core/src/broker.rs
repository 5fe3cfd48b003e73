use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy::primitives::Bytes;
use serde_json::Value;

use crate::bridge::ChannelBridge;
use crate::config::ProviderConfig;
use crate::domain::{RequestPayload, JSONRPC_VERSION};
use crate::error::ProviderError;
use crate::events::{EventHub, EventListener, ProviderEvent, ProviderEventKind};
use crate::polling::{AuthorizationPoller, DEFAULT_POLL_INTERVAL};
use crate::ports::{ClockPort, HostProviderPort, NodePort, PortError, ServicePort, SurfaceHost};
use crate::session::{parse_accounts, Session};

pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
pub const ETH_ACCOUNTS: &str = "eth_accounts";
pub const ETH_COINBASE: &str = "eth_coinbase";
pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const NET_VERSION: &str = "net_version";
pub const ETH_SIGN: &str = "eth_sign";
pub const PERSONAL_SIGN: &str = "personal_sign";
pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const SEND_BATCH_TRANSACTION: &str = "blocto_sendBatchTransaction";
pub const ETH_SIGN_TRANSACTION: &str = "eth_signTransaction";
pub const ETH_SEND_RAW_TRANSACTION: &str = "eth_sendRawTransaction";

/// How the broker handles a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    RequestAccounts,
    Accounts,
    Coinbase,
    ChainId,
    NetVersion,
    EthSign,
    PersonalSign,
    SendTransaction,
    SendBatchTransaction,
    /// Raw/offline signing: answered with `null`.
    Unsupported,
    Passthrough,
}

impl MethodKind {
    pub fn classify(method: &str) -> Self {
        match method {
            ETH_REQUEST_ACCOUNTS => MethodKind::RequestAccounts,
            ETH_ACCOUNTS => MethodKind::Accounts,
            ETH_COINBASE => MethodKind::Coinbase,
            ETH_CHAIN_ID => MethodKind::ChainId,
            NET_VERSION => MethodKind::NetVersion,
            ETH_SIGN => MethodKind::EthSign,
            PERSONAL_SIGN => MethodKind::PersonalSign,
            ETH_SEND_TRANSACTION => MethodKind::SendTransaction,
            SEND_BATCH_TRANSACTION => MethodKind::SendBatchTransaction,
            ETH_SIGN_TRANSACTION | ETH_SEND_RAW_TRANSACTION => MethodKind::Unsupported,
            _ => MethodKind::Passthrough,
        }
    }
}

/// EIP-1193 style provider backed by a custodial wallet service.
pub struct Provider<N, S, H, C>
where
    N: NodePort,
    S: ServicePort,
    H: SurfaceHost,
    C: ClockPort,
{
    pub config: ProviderConfig,
    pub node: N,
    pub service: S,
    pub host: H,
    pub clock: C,
    host_provider: Option<Box<dyn HostProviderPort>>,
    session: Session,
    events: EventHub,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl<N, S, H, C> Provider<N, S, H, C>
where
    N: NodePort,
    S: ServicePort,
    H: SurfaceHost,
    C: ClockPort,
{
    pub fn new(config: ProviderConfig, node: N, service: S, host: H, clock: C) -> Self {
        Self {
            config,
            node,
            service,
            host,
            clock,
            host_provider: None,
            session: Session::new(),
            events: EventHub::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            next_id: AtomicU64::new(0),
        }
    }

    /// Forwards every call to an already-present compatible provider instead.
    pub fn with_host_provider(mut self, host_provider: Box<dyn HostProviderPort>) -> Self {
        self.host_provider = Some(host_provider);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn on(
        &self,
        kind: ProviderEventKind,
        listener: EventListener,
    ) -> Result<u64, ProviderError> {
        Ok(self.events.on(kind, listener)?)
    }

    pub fn remove_listener(&self, id: u64) -> Result<bool, ProviderError> {
        Ok(self.events.remove_listener(id)?)
    }

    pub fn drain_events(&self) -> Result<Vec<ProviderEvent>, ProviderError> {
        Ok(self.events.drain()?)
    }

    /// Reserves `count` consecutive request ids and returns the id before the first.
    pub(crate) fn reserve_ids(&self, count: u64) -> u64 {
        self.next_id.fetch_add(count, Ordering::SeqCst)
    }

    pub(crate) fn has_host_provider(&self) -> bool {
        self.host_provider.is_some()
    }

    /// EIP-1102 `enable`: runs the login handshake and returns the accounts.
    pub async fn enable(&self) -> Result<Value, ProviderError> {
        if let Some(host_provider) = &self.host_provider {
            return Ok(host_provider.enable().await?);
        }
        let accounts = self.authenticate().await?;
        Ok(accounts_json(&accounts))
    }

    pub async fn request(&self, payload: &RequestPayload) -> Result<Value, ProviderError> {
        if let Some(host_provider) = &self.host_provider {
            tracing::debug!(method = %payload.method, "forwarding to host provider");
            return Ok(host_provider.request(payload).await?);
        }

        let outcome: Result<Value, ProviderError> = async {
            if !self.session.is_connected() {
                self.authenticate().await?;
            }
            self.dispatch(payload).await
        }
        .await;
        if let Err(e) = &outcome {
            tracing::error!(method = %payload.method, error = %e, "request failed");
        }
        outcome
    }

    async fn dispatch(&self, payload: &RequestPayload) -> Result<Value, ProviderError> {
        let kind = MethodKind::classify(&payload.method);
        tracing::debug!(method = %payload.method, ?kind, "dispatching request");
        match kind {
            MethodKind::RequestAccounts => {
                self.refresh_accounts().await?;
                self.accounts().await
            }
            MethodKind::Accounts => self.accounts().await,
            MethodKind::Coinbase => Ok(self
                .session
                .primary_account()
                .map(Value::String)
                .unwrap_or(Value::Null)),
            MethodKind::ChainId => Ok(Value::String(format!("{:#x}", self.config.chain_id))),
            MethodKind::NetVersion => Ok(Value::String(format!("{:#x}", self.config.network_id()))),
            MethodKind::EthSign => self.handle_sign(payload, 1).await,
            MethodKind::PersonalSign => self.handle_sign(payload, 0).await,
            MethodKind::SendTransaction | MethodKind::SendBatchTransaction => {
                self.handle_send_transaction(payload).await
            }
            MethodKind::Unsupported => Ok(Value::Null),
            MethodKind::Passthrough => self.handle_read_request(payload).await,
        }
    }

    async fn authenticate(&self) -> Result<Vec<String>, ProviderError> {
        let bridge = ChannelBridge::new(&self.host, self.config.service_endpoint()?);
        let (code, addr) = bridge
            .authenticate(self.config.chain_name(), self.config.app_id.as_deref())
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "authentication did not complete"))?;
        let accounts = parse_accounts(&[addr])?;
        self.session.mark_connected(code, accounts.clone());
        tracing::info!(chain = self.config.chain_name(), "custody session established");
        self.events.emit(
            ProviderEventKind::Connect,
            format!("{:#x}", self.config.chain_id),
        )?;
        Ok(accounts)
    }

    async fn refresh_accounts(&self) -> Result<Vec<String>, ProviderError> {
        let before = self.session.current_accounts();
        let after = self
            .session
            .refresh_accounts(&self.service, self.config.chain_name())
            .await?;
        if before != after {
            let serialized = serde_json::to_string(&after).unwrap_or_else(|_| "[]".to_owned());
            self.events
                .emit(ProviderEventKind::AccountsChanged, serialized)?;
        }
        Ok(after)
    }

    /// Cached accounts, fetched when the cache is empty.
    async fn accounts(&self) -> Result<Value, ProviderError> {
        let cached = self.session.current_accounts();
        let accounts = if cached.is_empty() {
            self.refresh_accounts().await?
        } else {
            cached
        };
        Ok(accounts_json(&accounts))
    }

    async fn handle_sign(
        &self,
        payload: &RequestPayload,
        message_index: usize,
    ) -> Result<Value, ProviderError> {
        let message = payload
            .param(message_index)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PortError::Validation(format!(
                    "{} expects a hex message at params[{message_index}]",
                    payload.method
                ))
            })?;
        let bridge = ChannelBridge::new(&self.host, self.config.service_endpoint()?);
        let raw = bridge
            .sign(self.config.chain_name(), &payload.method, message)
            .await?;
        let signature: Bytes = raw
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid signature hex: {e}")))?;
        Ok(Value::String(signature.to_string()))
    }

    async fn handle_send_transaction(
        &self,
        payload: &RequestPayload,
    ) -> Result<Value, ProviderError> {
        let code = self.session.session_code().ok_or_else(|| {
            PortError::NotFound("session code missing; authenticate first".to_owned())
        })?;
        let bridge = ChannelBridge::new(&self.host, self.config.service_endpoint()?);
        let poller = AuthorizationPoller::new(&self.service, &self.clock, self.poll_interval);
        let hash = poller
            .submit(
                &bridge,
                self.config.chain_name(),
                &code,
                &payload.params_value(),
            )
            .await?;
        Ok(Value::String(hash))
    }

    async fn handle_read_request(&self, payload: &RequestPayload) -> Result<Value, ProviderError> {
        let forwarded = RequestPayload {
            id: payload.id.or(Some(1)),
            jsonrpc: payload
                .jsonrpc
                .clone()
                .or_else(|| Some(JSONRPC_VERSION.to_owned())),
            method: payload.method.clone(),
            params: payload.params.clone(),
        };
        let body = self.node.call(&forwarded).await?;
        if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
            return Err(rpc_error(err));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn accounts_json(accounts: &[String]) -> Value {
    Value::Array(accounts.iter().cloned().map(Value::String).collect())
}

fn rpc_error(err: &Value) -> ProviderError {
    ProviderError::Rpc {
        code: err.get("code").and_then(Value::as_i64).unwrap_or(-32603),
        message: err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("node returned an error")
            .to_owned(),
        data: err.get("data").cloned(),
    }
}
