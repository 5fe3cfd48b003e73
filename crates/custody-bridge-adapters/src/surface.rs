//! Surface hosts.
//!
//! [`InProcessSurfaceHost`] keeps surfaces as plain records and lets the
//! embedder feed inbound messages through [`InProcessSurfaceHost::dispatch`];
//! it backs webview integrations and tests. On wasm32,
//! [`BrowserSurfaceHost`] mounts real iframes and listens on `window`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use custody_bridge_core::{
    ChannelMessage, MessageListener, PortError, Subscription, SurfaceHost, SurfaceId,
};

type SharedListener = Rc<RefCell<MessageListener>>;

/// Listeners keyed by the surface they were registered against.
#[derive(Default)]
struct ListenerRegistry {
    entries: Vec<(SurfaceId, Subscription, SharedListener)>,
}

impl ListenerRegistry {
    fn add(&mut self, surface: SurfaceId, listener: MessageListener) -> Subscription {
        let subscription = Subscription::new();
        self.entries.push((
            surface,
            subscription.clone(),
            Rc::new(RefCell::new(listener)),
        ));
        subscription
    }

    fn live_for(&mut self, surface: SurfaceId) -> Vec<(Subscription, SharedListener)> {
        self.prune();
        self.entries
            .iter()
            .filter(|(s, _, _)| *s == surface)
            .map(|(_, sub, listener)| (sub.clone(), Rc::clone(listener)))
            .collect()
    }

    fn drop_surface(&mut self, surface: SurfaceId) {
        self.entries.retain(|(s, sub, _)| {
            if *s == surface {
                sub.cancel();
                false
            } else {
                true
            }
        });
    }

    fn prune(&mut self) {
        self.entries.retain(|(_, sub, _)| !sub.is_cancelled());
    }

    fn live_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, sub, _)| !sub.is_cancelled())
            .count()
    }
}

/// Calls each listener outside any registry borrow so a listener may touch
/// the host again. Returns how many listeners ran.
fn deliver(listeners: Vec<(Subscription, SharedListener)>, message: &ChannelMessage) -> usize {
    let mut delivered = 0;
    for (sub, listener) in listeners {
        if sub.is_cancelled() {
            continue;
        }
        let Ok(mut listener) = listener.try_borrow_mut() else {
            continue;
        };
        (&mut **listener)(message, &sub);
        delivered += 1;
    }
    delivered
}

#[derive(Debug, Clone)]
struct SurfaceRecord {
    url: String,
    outbox: Vec<(Value, String)>,
}

#[derive(Default)]
struct InProcessState {
    next_id: u64,
    surfaces: BTreeMap<SurfaceId, SurfaceRecord>,
    listeners: ListenerRegistry,
}

#[derive(Clone, Default)]
pub struct InProcessSurfaceHost {
    page_origin: Option<String>,
    state: Rc<RefCell<InProcessState>>,
}

impl InProcessSurfaceHost {
    /// `page_origin` of `None` behaves like a non-browser host.
    pub fn new(page_origin: Option<String>) -> Self {
        Self {
            page_origin,
            state: Rc::default(),
        }
    }

    pub fn with_page_origin(page_origin: impl Into<String>) -> Self {
        Self::new(Some(page_origin.into()))
    }

    pub fn open_surfaces(&self) -> Vec<(SurfaceId, String)> {
        self.state
            .borrow()
            .surfaces
            .iter()
            .map(|(id, record)| (*id, record.url.clone()))
            .collect()
    }

    /// Messages posted into `surface` since the last call.
    pub fn take_outbox(&self, surface: SurfaceId) -> Vec<(Value, String)> {
        self.state
            .borrow_mut()
            .surfaces
            .get_mut(&surface)
            .map(|record| std::mem::take(&mut record.outbox))
            .unwrap_or_default()
    }

    /// Feeds an inbound message from `surface`. Messages for detached
    /// surfaces are dropped.
    pub fn dispatch(&self, surface: SurfaceId, message: ChannelMessage) -> usize {
        let listeners = {
            let mut g = self.state.borrow_mut();
            if !g.surfaces.contains_key(&surface) {
                tracing::debug!(?surface, "message for detached surface dropped");
                return 0;
            }
            g.listeners.live_for(surface)
        };
        let delivered = deliver(listeners, &message);
        self.state.borrow_mut().listeners.prune();
        delivered
    }

    pub fn live_listeners(&self) -> usize {
        self.state.borrow().listeners.live_count()
    }
}

impl SurfaceHost for InProcessSurfaceHost {
    fn page_origin(&self) -> Option<String> {
        self.page_origin.clone()
    }

    fn attach(&self, url: &str) -> Result<SurfaceId, PortError> {
        let mut g = self.state.borrow_mut();
        g.next_id = g.next_id.saturating_add(1);
        let id = SurfaceId(g.next_id);
        g.surfaces.insert(
            id,
            SurfaceRecord {
                url: url.to_owned(),
                outbox: Vec::new(),
            },
        );
        Ok(id)
    }

    fn detach(&self, surface: SurfaceId) {
        let mut g = self.state.borrow_mut();
        if g.surfaces.remove(&surface).is_some() {
            g.listeners.drop_surface(surface);
        }
    }

    fn post_message(
        &self,
        surface: SurfaceId,
        message: &Value,
        target_origin: &str,
    ) -> Result<(), PortError> {
        let mut g = self.state.borrow_mut();
        let record = g
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| PortError::NotFound(format!("surface {} is not attached", surface.0)))?;
        record.outbox.push((message.clone(), target_origin.to_owned()));
        Ok(())
    }

    fn subscribe(&self, surface: SurfaceId, listener: MessageListener) -> Subscription {
        self.state.borrow_mut().listeners.add(surface, listener)
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserSurfaceHost;

#[cfg(target_arch = "wasm32")]
mod browser {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::{Rc, Weak};

    use serde::Serialize;
    use serde_json::Value;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::{HtmlIFrameElement, MessageEvent};

    use custody_bridge_core::{
        ChannelMessage, MessageListener, PortError, Subscription, SurfaceHost, SurfaceId,
    };

    use super::{deliver, ListenerRegistry};

    const FRAME_STYLE: [(&str, &str); 7] = [
        ("position", "fixed"),
        ("top", "0"),
        ("left", "0"),
        ("width", "100%"),
        ("height", "100%"),
        ("border", "none"),
        ("z-index", "2147483647"),
    ];

    #[derive(Default)]
    struct BrowserState {
        next_id: u64,
        frames: BTreeMap<SurfaceId, HtmlIFrameElement>,
        listeners: ListenerRegistry,
        on_message: Option<Closure<dyn FnMut(MessageEvent)>>,
    }

    /// Mounts each surface as an iframe overlay and routes `window`
    /// `message` events to the surface whose `contentWindow` sent them.
    #[derive(Clone, Default)]
    pub struct BrowserSurfaceHost {
        state: Rc<RefCell<BrowserState>>,
    }

    impl BrowserSurfaceHost {
        pub fn new() -> Self {
            Self::default()
        }

        fn ensure_window_listener(&self) -> Result<(), PortError> {
            if self.state.borrow().on_message.is_some() {
                return Ok(());
            }
            let window = web_sys::window()
                .ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
            let weak: Weak<RefCell<BrowserState>> = Rc::downgrade(&self.state);
            let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
                if let Some(state) = weak.upgrade() {
                    route_message(&state, &event);
                }
            });
            window
                .add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())
                .map_err(|e| PortError::Transport(format!("add message listener failed: {e:?}")))?;
            self.state.borrow_mut().on_message = Some(on_message);
            Ok(())
        }
    }

    fn route_message(state: &Rc<RefCell<BrowserState>>, event: &MessageEvent) {
        let Some(source) = event.source() else {
            return;
        };
        let source = JsValue::from(source);
        let listeners = {
            let mut g = state.borrow_mut();
            let surface = g.frames.iter().find_map(|(id, frame)| {
                frame
                    .content_window()
                    .filter(|w| js_sys::Object::is(&JsValue::from(w.clone()), &source))
                    .map(|_| *id)
            });
            let Some(surface) = surface else {
                return;
            };
            g.listeners.live_for(surface)
        };
        if listeners.is_empty() {
            return;
        }
        let Ok(data) = serde_wasm_bindgen::from_value::<Value>(event.data()) else {
            tracing::debug!("undecodable surface message ignored");
            return;
        };
        deliver(listeners, &ChannelMessage::new(event.origin(), data));
        state.borrow_mut().listeners.prune();
    }

    impl SurfaceHost for BrowserSurfaceHost {
        fn page_origin(&self) -> Option<String> {
            web_sys::window().and_then(|w| w.location().origin().ok())
        }

        fn attach(&self, url: &str) -> Result<SurfaceId, PortError> {
            self.ensure_window_listener()?;
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or_else(|| PortError::Transport("missing document".to_owned()))?;
            let frame: HtmlIFrameElement = document
                .create_element("iframe")
                .map_err(|e| PortError::Transport(format!("create iframe failed: {e:?}")))?
                .dyn_into()
                .map_err(|_| PortError::Transport("iframe element has wrong type".to_owned()))?;
            frame.set_src(url);
            let style = frame.style();
            for (property, value) in FRAME_STYLE {
                style
                    .set_property(property, value)
                    .map_err(|e| PortError::Transport(format!("style iframe failed: {e:?}")))?;
            }
            let body = document
                .body()
                .ok_or_else(|| PortError::Transport("missing document body".to_owned()))?;
            body.append_child(&frame)
                .map_err(|e| PortError::Transport(format!("attach iframe failed: {e:?}")))?;

            let mut g = self.state.borrow_mut();
            g.next_id = g.next_id.saturating_add(1);
            let id = SurfaceId(g.next_id);
            g.frames.insert(id, frame);
            Ok(id)
        }

        fn detach(&self, surface: SurfaceId) {
            let mut g = self.state.borrow_mut();
            if let Some(frame) = g.frames.remove(&surface) {
                frame.remove();
                g.listeners.drop_surface(surface);
            }
        }

        fn post_message(
            &self,
            surface: SurfaceId,
            message: &Value,
            target_origin: &str,
        ) -> Result<(), PortError> {
            let g = self.state.borrow();
            let target = g
                .frames
                .get(&surface)
                .and_then(|frame| frame.content_window())
                .ok_or_else(|| {
                    PortError::NotFound(format!("surface {} is not attached", surface.0))
                })?;
            let payload = message
                .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
                .map_err(|e| PortError::Transport(format!("encode surface message failed: {e}")))?;
            target
                .post_message(&payload, target_origin)
                .map_err(|e| PortError::Transport(format!("postMessage failed: {e:?}")))
        }

        fn subscribe(&self, surface: SurfaceId, listener: MessageListener) -> Subscription {
            self.state.borrow_mut().listeners.add(surface, listener)
        }
    }
}
