use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{AuthorizationStatus, ChannelMessage, RequestPayload, SurfaceId};

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// JSON-RPC node the broker forwards unhandled methods to.
#[async_trait(?Send)]
pub trait NodePort {
    /// Returns the whole response body; the caller extracts `result`.
    async fn call(&self, payload: &RequestPayload) -> Result<Value, PortError>;
}

/// REST surface of the custody service.
#[async_trait(?Send)]
pub trait ServicePort {
    async fn fetch_accounts(&self, chain: &str, code: &str) -> Result<Vec<String>, PortError>;
    /// Submits transaction params for user approval; returns the authorization id.
    async fn create_authorization(
        &self,
        chain: &str,
        code: &str,
        params: &Value,
    ) -> Result<String, PortError>;
    async fn authorization_status(
        &self,
        chain: &str,
        authorization_id: &str,
    ) -> Result<AuthorizationStatus, PortError>;
}

#[async_trait(?Send)]
pub trait ClockPort {
    async fn sleep(&self, duration: Duration);
}

/// An already-authenticated provider injected by the host (e.g. an in-app
/// browser shipping the same SDK). When present it handles every call.
#[async_trait(?Send)]
pub trait HostProviderPort {
    async fn request(&self, payload: &RequestPayload) -> Result<Value, PortError>;
    async fn enable(&self) -> Result<Value, PortError>;
}

pub type MessageListener = Box<dyn FnMut(&ChannelMessage, &Subscription)>;

/// Embedded UI surfaces and their message channel.
pub trait SurfaceHost {
    /// Origin of the embedding page, `None` outside a browser-like host.
    fn page_origin(&self) -> Option<String>;
    fn attach(&self, url: &str) -> Result<SurfaceId, PortError>;
    /// Detaching an unknown or already detached surface is a no-op.
    fn detach(&self, surface: SurfaceId);
    fn post_message(
        &self,
        surface: SurfaceId,
        message: &Value,
        target_origin: &str,
    ) -> Result<(), PortError>;
    /// Registers a listener for messages coming from `surface`. The listener
    /// receives its own subscription so it can cancel itself.
    fn subscribe(&self, surface: SurfaceId, listener: MessageListener) -> Subscription;
}

/// Handle to a registered listener. Hosts stop delivering once cancelled.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
