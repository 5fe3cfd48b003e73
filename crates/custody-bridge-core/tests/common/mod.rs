#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use custody_bridge_core::{
    AuthorizationStatus, AuthzStatus, ChainTable, ChannelMessage, ClockPort, EnvOverrides,
    MessageListener, NodePort, PortError, Provider, ProviderConfig, ProviderOptions,
    RequestPayload, ServicePort, Subscription, SurfaceHost, SurfaceId,
};

pub const SERVICE: &str = "https://custody.test";
pub const PAGE: &str = "https://dapp.test";
pub const ACCOUNT: &str = "0x1000000000000000000000000000000000000001";
pub const SECOND_ACCOUNT: &str = "0x2000000000000000000000000000000000000002";
pub const TX_HASH: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct FakeNode {
    pub calls: RefCell<Vec<RequestPayload>>,
    pub response: RefCell<Option<Value>>,
}

#[async_trait(?Send)]
impl NodePort for FakeNode {
    async fn call(&self, payload: &RequestPayload) -> Result<Value, PortError> {
        self.calls.borrow_mut().push(payload.clone());
        Ok(self
            .response
            .borrow()
            .clone()
            .unwrap_or_else(|| json!({"jsonrpc": "2.0", "id": payload.id, "result": "0x10"})))
    }
}

pub struct FakeService {
    pub calls: RefCell<Vec<String>>,
    pub accounts: RefCell<Vec<String>>,
    pub statuses: RefCell<VecDeque<AuthzStatus>>,
    pub submitted: RefCell<Vec<Value>>,
    pub polls: Cell<u32>,
    pub fail_status: Cell<bool>,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            accounts: RefCell::new(vec![ACCOUNT.to_owned()]),
            statuses: RefCell::new(VecDeque::new()),
            submitted: RefCell::new(Vec::new()),
            polls: Cell::new(0),
            fail_status: Cell::new(false),
        }
    }
}

#[async_trait(?Send)]
impl ServicePort for FakeService {
    async fn fetch_accounts(&self, chain: &str, code: &str) -> Result<Vec<String>, PortError> {
        self.calls
            .borrow_mut()
            .push(format!("GET /api/{chain}/accounts?code={code}"));
        Ok(self.accounts.borrow().clone())
    }

    async fn create_authorization(
        &self,
        chain: &str,
        code: &str,
        params: &Value,
    ) -> Result<String, PortError> {
        self.calls
            .borrow_mut()
            .push(format!("POST /api/{chain}/authz?code={code}"));
        self.submitted.borrow_mut().push(params.clone());
        Ok("authz-1".to_owned())
    }

    async fn authorization_status(
        &self,
        chain: &str,
        authorization_id: &str,
    ) -> Result<AuthorizationStatus, PortError> {
        self.polls.set(self.polls.get() + 1);
        self.calls.borrow_mut().push(format!(
            "GET /api/{chain}/authz?authorizationId={authorization_id}"
        ));
        if self.fail_status.get() {
            return Err(PortError::Transport("status endpoint unavailable".to_owned()));
        }
        let status = self
            .statuses
            .borrow_mut()
            .pop_front()
            .unwrap_or(AuthzStatus::Pending);
        let transaction_hash = (status == AuthzStatus::Approved).then(|| TX_HASH.to_owned());
        Ok(AuthorizationStatus {
            status,
            transaction_hash,
        })
    }
}

#[derive(Default)]
pub struct InstantClock {
    pub sleeps: RefCell<Vec<Duration>>,
}

#[async_trait(?Send)]
impl ClockPort for InstantClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

type SharedListener = Rc<RefCell<MessageListener>>;

#[derive(Default)]
struct HostState {
    next_id: u64,
    attached: Vec<(SurfaceId, String)>,
    detached: Vec<SurfaceId>,
    listeners: Vec<(SurfaceId, Subscription, SharedListener)>,
    posted: Vec<(SurfaceId, Value, String)>,
}

/// Surface host that records everything and lets tests inject messages.
#[derive(Clone, Default)]
pub struct FakeHost {
    origin: Option<String>,
    state: Rc<RefCell<HostState>>,
}

impl FakeHost {
    pub fn browser() -> Self {
        Self {
            origin: Some(PAGE.to_owned()),
            state: Rc::default(),
        }
    }

    pub fn headless() -> Self {
        Self::default()
    }

    pub fn deliver(&self, surface: SurfaceId, message: ChannelMessage) {
        let listeners: Vec<(Subscription, SharedListener)> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|(s, sub, _)| *s == surface && !sub.is_cancelled())
            .map(|(_, sub, l)| (sub.clone(), Rc::clone(l)))
            .collect();
        for (sub, listener) in listeners {
            if sub.is_cancelled() {
                continue;
            }
            let mut listener = listener.borrow_mut();
            (&mut **listener)(&message, &sub);
        }
        self.state
            .borrow_mut()
            .listeners
            .retain(|(_, sub, _)| !sub.is_cancelled());
    }

    /// Latest attached, not yet detached, surface whose URL contains `fragment`.
    pub fn open_surface(&self, fragment: &str) -> Option<SurfaceId> {
        let g = self.state.borrow();
        g.attached
            .iter()
            .rev()
            .find(|(id, url)| url.contains(fragment) && !g.detached.contains(id))
            .map(|(id, _)| *id)
    }

    pub fn attached_urls(&self) -> Vec<String> {
        self.state
            .borrow()
            .attached
            .iter()
            .map(|(_, url)| url.clone())
            .collect()
    }

    pub fn detached(&self) -> Vec<SurfaceId> {
        self.state.borrow().detached.clone()
    }

    pub fn posted(&self) -> Vec<(SurfaceId, Value, String)> {
        self.state.borrow().posted.clone()
    }

    pub fn live_listeners(&self) -> usize {
        self.state
            .borrow()
            .listeners
            .iter()
            .filter(|(_, sub, _)| !sub.is_cancelled())
            .count()
    }
}

impl SurfaceHost for FakeHost {
    fn page_origin(&self) -> Option<String> {
        self.origin.clone()
    }

    fn attach(&self, url: &str) -> Result<SurfaceId, PortError> {
        let mut g = self.state.borrow_mut();
        g.next_id += 1;
        let id = SurfaceId(g.next_id);
        g.attached.push((id, url.to_owned()));
        Ok(id)
    }

    fn detach(&self, surface: SurfaceId) {
        // Every call is recorded so tests can assert single teardown.
        let mut g = self.state.borrow_mut();
        g.detached.push(surface);
        g.listeners.retain(|(_, sub, _)| !sub.is_cancelled());
    }

    fn post_message(
        &self,
        surface: SurfaceId,
        message: &Value,
        target_origin: &str,
    ) -> Result<(), PortError> {
        self.state
            .borrow_mut()
            .posted
            .push((surface, message.clone(), target_origin.to_owned()));
        Ok(())
    }

    fn subscribe(&self, surface: SurfaceId, listener: MessageListener) -> Subscription {
        let sub = Subscription::new();
        self.state
            .borrow_mut()
            .listeners
            .push((surface, sub.clone(), Rc::new(RefCell::new(listener))));
        sub
    }
}

/// Waits until a surface matching `fragment` is open, then delivers `data`
/// from `origin` to it.
pub async fn deliver_when_open(host: &FakeHost, fragment: &str, origin: &str, data: Value) {
    for _ in 0..10_000 {
        if let Some(surface) = host.open_surface(fragment) {
            host.deliver(surface, ChannelMessage::new(origin, data));
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("no surface matching {fragment} was opened");
}

pub async fn approve_login(host: &FakeHost) {
    deliver_when_open(
        host,
        "/authn",
        SERVICE,
        json!({"type": "FCL::CHALLENGE::RESPONSE", "code": "session-code", "addr": ACCOUNT}),
    )
    .await;
}

pub type TestProvider = Provider<FakeNode, FakeService, FakeHost, InstantClock>;

pub fn config(chain_id: u64) -> ProviderConfig {
    ProviderConfig::resolve(
        &ProviderOptions::new(chain_id)
            .rpc("https://node.test")
            .server(SERVICE),
        &EnvOverrides::default(),
        &ChainTable::builtin(),
    )
    .expect("resolve config")
}

pub fn new_provider() -> TestProvider {
    init_tracing();
    Provider::new(
        config(1),
        FakeNode::default(),
        FakeService::default(),
        FakeHost::browser(),
        InstantClock::default(),
    )
}

pub fn headless_provider() -> TestProvider {
    init_tracing();
    Provider::new(
        config(1),
        FakeNode::default(),
        FakeService::default(),
        FakeHost::headless(),
        InstantClock::default(),
    )
}

pub async fn connect(provider: &TestProvider) {
    let (accounts, ()) = tokio::join!(provider.enable(), approve_login(&provider.host));
    accounts.expect("handshake");
}
