//! Typed publish/subscribe for realtime events.
//!
//! Handlers are registered per event name and invoked in registration
//! order; events for one name are delivered FIFO because publication
//! happens from the single socket task. Explicit unsubscription (by handle
//! or wholesale per event) keeps handlers from leaking across logout/login
//! cycles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use omnilead_shared::models::{ConversationPatch, Message};
use omnilead_shared::types::ConversationId;

/// Logical event streams a subscriber can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    NewMessage,
    ConversationUpdated,
    Connected,
    Disconnected,
}

/// A delivered occurrence of one event.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    NewMessage {
        conversation_id: ConversationId,
        message: Message,
    },
    ConversationUpdated(ConversationPatch),
    Connected,
    Disconnected,
}

impl RealtimeEvent {
    pub fn name(&self) -> EventName {
        match self {
            RealtimeEvent::NewMessage { .. } => EventName::NewMessage,
            RealtimeEvent::ConversationUpdated(_) => EventName::ConversationUpdated,
            RealtimeEvent::Connected => EventName::Connected,
            RealtimeEvent::Disconnected => EventName::Disconnected,
        }
    }
}

type Handler = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]; required to remove exactly
/// that handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    event: EventName,
    id: u64,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: HashMap<EventName, Vec<(u64, Handler)>>,
}

/// Shared handler registry. Clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every future occurrence of `event`.
    pub fn subscribe<F>(&self, event: EventName, handler: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .handlers
            .entry(event)
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription { event, id }
    }

    /// Remove one handler. Unknown handles are ignored.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        if let Some(handlers) = inner.handlers.get_mut(&subscription.event) {
            handlers.retain(|(id, _)| *id != subscription.id);
        }
    }

    /// Remove every handler registered for `event`.
    pub fn unsubscribe_all(&self, event: EventName) {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        inner.handlers.remove(&event);
    }

    /// Deliver `event` to its handlers in registration order.
    pub fn publish(&self, event: &RealtimeEvent) {
        // Snapshot under the lock, invoke outside it, so a handler may
        // subscribe or unsubscribe without deadlocking.
        let handlers: Vec<Handler> = {
            let inner = self.inner.lock().expect("bus lock poisoned");
            inner
                .handlers
                .get(&event.name())
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            handler(event);
        }
    }

    pub fn handler_count(&self, event: EventName) -> usize {
        let inner = self.inner.lock().expect("bus lock poisoned");
        inner.handlers.get(&event).map_or(0, Vec::len)
    }
}
