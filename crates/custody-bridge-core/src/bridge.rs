//! Request/response cycles with the custody service's embedded pages.
//!
//! Every delegated operation opens its own surface and registers listeners
//! scoped to it, so concurrent operations never see each other's messages.
//! Listeners cancel themselves on a terminal message; the owning
//! [`PendingExchange`] cancels whatever is left and detaches the surface
//! exactly once, including when it is dropped mid-flight.

use futures::channel::oneshot;
use serde_json::Value;
use url::Url;

use crate::domain::{ChannelMessage, FrameMessage, SignStatus, SurfaceId};
use crate::error::ProviderError;
use crate::ports::{PortError, Subscription, SurfaceHost};

const BROWSER_ONLY: &str = "Currently only supported in browser";

/// What a listener decided about one decoded frame message.
pub enum Verdict<T> {
    Ignore,
    Resolve(T),
    Reject(ProviderError),
}

pub struct ChannelBridge<'a, H: SurfaceHost + ?Sized> {
    host: &'a H,
    service_origin: &'a str,
}

impl<'a, H: SurfaceHost + ?Sized> ChannelBridge<'a, H> {
    pub fn new(host: &'a H, service_origin: &'a str) -> Self {
        Self {
            host,
            service_origin,
        }
    }

    pub fn require_browser(&self) -> Result<String, ProviderError> {
        self.host
            .page_origin()
            .ok_or_else(|| ProviderError::Environment(BROWSER_ONLY.to_owned()))
    }

    pub fn open(&self, url: &str) -> Result<PendingExchange<'a, H>, ProviderError> {
        let surface = self.host.attach(url)?;
        tracing::debug!(?surface, url, "attached embedded surface");
        Ok(PendingExchange {
            host: self.host,
            surface,
            origin: self.service_origin.to_owned(),
            subscriptions: Vec::new(),
            torn_down: false,
        })
    }

    /// Runs the login challenge. Returns the session code and the address
    /// the service authenticated.
    pub async fn authenticate(
        &self,
        chain: &str,
        app_id: Option<&str>,
    ) -> Result<(String, String), ProviderError> {
        let page_origin = self.require_browser()?;
        let mut url = self.endpoint("authn")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("l6n", &page_origin).append_pair("chain", chain);
            if let Some(app_id) = app_id {
                query.append_pair("appId", app_id);
            }
        }

        let mut exchange = self.open(url.as_str())?;
        let reply = exchange.listen(|frame| match frame {
            FrameMessage::ChallengeResponse { code, addr } => Verdict::Resolve((code, addr)),
            FrameMessage::ChallengeCancel => {
                Verdict::Reject(ProviderError::UserDeclined("authentication cancelled".to_owned()))
            }
            _ => Verdict::Ignore,
        });
        let outcome = reply.wait().await;
        exchange.close();
        outcome
    }

    /// Two-phase signing: wait for the page to announce itself, hand it the
    /// message, then wait for the user's decision.
    pub async fn sign(
        &self,
        chain: &str,
        method: &str,
        message_hex: &str,
    ) -> Result<String, ProviderError> {
        self.require_browser()?;
        let url = self.endpoint(&format!("user-signature/{chain}"))?.to_string();

        let mut exchange = self.open(&url)?;
        let ready = exchange.listen(|frame| match frame {
            FrameMessage::Ready => Verdict::Resolve(()),
            _ => Verdict::Ignore,
        });
        let response = exchange.listen(|frame| match frame {
            FrameMessage::Response {
                status: SignStatus::Approved,
                signature: Some(signature),
            } => Verdict::Resolve(signature),
            FrameMessage::Response {
                status: SignStatus::Approved,
                signature: None,
            } => Verdict::Reject(
                PortError::Validation("approved sign response carried no signature".to_owned())
                    .into(),
            ),
            FrameMessage::Response {
                status: SignStatus::Declined,
                ..
            } => Verdict::Reject(ProviderError::UserDeclined(
                "signature request declined".to_owned(),
            )),
            _ => Verdict::Ignore,
        });

        let body = message_hex.strip_prefix("0x").unwrap_or(message_hex);
        let handoff = FrameMessage::ReadyResponse {
            method: method.to_owned(),
            message: body.to_owned(),
            chain: chain.to_owned(),
        };
        let outcome: Result<String, ProviderError> = async {
            ready.wait().await?;
            let message = serde_json::to_value(&handoff)
                .map_err(|e| PortError::Validation(format!("encode sign handoff: {e}")))?;
            exchange.post(&message, &url)?;
            response.wait().await
        }
        .await;
        exchange.close();
        outcome
    }

    /// Shows the approval page for a submitted transaction authorization.
    pub fn open_authorization(
        &self,
        chain: &str,
        authorization_id: &str,
    ) -> Result<PendingExchange<'a, H>, ProviderError> {
        self.require_browser()?;
        let url = self.endpoint(&format!("authz/{chain}/{authorization_id}"))?;
        self.open(url.as_str())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        Url::parse(&format!("{}/{path}", self.service_origin)).map_err(|e| {
            ProviderError::Configuration(format!(
                "invalid service endpoint {}: {e}",
                self.service_origin
            ))
        })
    }
}

/// One open surface plus the listeners waiting on it.
pub struct PendingExchange<'a, H: SurfaceHost + ?Sized> {
    host: &'a H,
    surface: SurfaceId,
    origin: String,
    subscriptions: Vec<Subscription>,
    torn_down: bool,
}

impl<H: SurfaceHost + ?Sized> PendingExchange<'_, H> {
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Arms a listener that settles on the first message `classify` does not
    /// ignore. Messages from any other origin are skipped.
    pub fn listen<T, F>(&mut self, mut classify: F) -> Reply<T>
    where
        T: 'static,
        F: FnMut(FrameMessage) -> Verdict<T> + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let origin = self.origin.clone();
        let listener = Box::new(move |msg: &ChannelMessage, sub: &Subscription| {
            if msg.origin != origin {
                return;
            }
            let Some(frame) = msg.frame_message() else {
                return;
            };
            let outcome = match classify(frame) {
                Verdict::Ignore => return,
                Verdict::Resolve(value) => Ok(value),
                Verdict::Reject(err) => Err(err),
            };
            sub.cancel();
            if let Some(tx) = tx.take() {
                let _ = tx.send(outcome);
            }
        });
        let subscription = self.host.subscribe(self.surface, listener);
        self.subscriptions.push(subscription);
        Reply { rx }
    }

    pub fn post(&self, message: &Value, target_origin: &str) -> Result<(), ProviderError> {
        self.host
            .post_message(self.surface, message, target_origin)
            .map_err(ProviderError::from)
    }

    /// Cancels every listener and detaches the surface. Later calls do nothing.
    pub fn close(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        for sub in &self.subscriptions {
            sub.cancel();
        }
        self.host.detach(self.surface);
        tracing::debug!(surface = ?self.surface, "detached embedded surface");
    }
}

impl<H: SurfaceHost + ?Sized> Drop for PendingExchange<'_, H> {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct Reply<T> {
    rx: oneshot::Receiver<Result<T, ProviderError>>,
}

impl<T> Reply<T> {
    pub async fn wait(self) -> Result<T, ProviderError> {
        self.rx.await.map_err(|_| {
            ProviderError::Remote(PortError::Transport(
                "embedded surface closed before responding".to_owned(),
            ))
        })?
    }
}
