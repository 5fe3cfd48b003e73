use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::ports::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEventKind {
    Connect,
    AccountsChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub sequence: u64,
    pub kind: ProviderEventKind,
    pub value: String,
}

pub type EventListener = Arc<dyn Fn(&ProviderEvent)>;

/// Sequenced provider events: delivered to listeners and kept for draining.
#[derive(Default)]
pub(crate) struct EventHub {
    inner: Mutex<EventHubState>,
}

#[derive(Default)]
struct EventHubState {
    event_seq: u64,
    events: Vec<ProviderEvent>,
    next_listener_id: u64,
    listeners: Vec<(u64, ProviderEventKind, EventListener)>,
}

impl EventHub {
    pub fn on(&self, kind: ProviderEventKind, listener: EventListener) -> Result<u64, PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("event hub lock poisoned: {e}")))?;
        g.next_listener_id = g.next_listener_id.saturating_add(1);
        let id = g.next_listener_id;
        g.listeners.push((id, kind, listener));
        Ok(id)
    }

    pub fn remove_listener(&self, id: u64) -> Result<bool, PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("event hub lock poisoned: {e}")))?;
        let before = g.listeners.len();
        g.listeners.retain(|(lid, _, _)| *lid != id);
        Ok(g.listeners.len() != before)
    }

    pub fn emit(&self, kind: ProviderEventKind, value: String) -> Result<(), PortError> {
        let (event, listeners) = {
            let mut g = self
                .inner
                .lock()
                .map_err(|e| PortError::Transport(format!("event hub lock poisoned: {e}")))?;
            g.event_seq = g.event_seq.saturating_add(1);
            let event = ProviderEvent {
                sequence: g.event_seq,
                kind,
                value,
            };
            g.events.push(event.clone());
            let listeners: Vec<EventListener> = g
                .listeners
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, l)| Arc::clone(l))
                .collect();
            (event, listeners)
        };
        // Listeners may call back into the provider, so the lock is released first.
        for listener in listeners {
            listener(&event);
        }
        Ok(())
    }

    pub fn drain(&self) -> Result<Vec<ProviderEvent>, PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("event hub lock poisoned: {e}")))?;
        Ok(std::mem::take(&mut g.events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn listeners_only_see_their_kind_and_can_be_removed() {
        let hub = EventHub::default();
        let connects = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&connects);
        let id = hub
            .on(
                ProviderEventKind::Connect,
                Arc::new(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .expect("register");

        hub.emit(ProviderEventKind::Connect, "0x1".to_owned()).expect("emit");
        hub.emit(ProviderEventKind::AccountsChanged, "[]".to_owned()).expect("emit");
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        assert!(hub.remove_listener(id).expect("remove"));
        assert!(!hub.remove_listener(id).expect("remove twice"));
        hub.emit(ProviderEventKind::Connect, "0x1".to_owned()).expect("emit");
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        let events = hub.drain().expect("drain");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].sequence + 1, events[1].sequence);
        assert!(hub.drain().expect("drain empty").is_empty());
    }
}
