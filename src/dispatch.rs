//! Typed event subscriptions.
//!
//! Delivery is synchronous: [`EventRegistry::publish`] calls every callback
//! registered for the event's kind, in registration order, on the calling
//! task. A panicking callback is logged and skipped; the rest still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use crate::event::{Event, EventKind, EventPayload, SessionId};

/// Handle returned by [`EventRegistry::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(SessionId, &Event) + Send + Sync>;

/// Subscription table shared by every session of a manager.
#[derive(Default)]
pub struct EventRegistry {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Callback)>>>,
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers = self.subscribers.read();
        f.debug_struct("EventRegistry")
            .field("kinds", &subscribers.len())
            .field(
                "callbacks",
                &subscribers.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every event of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(SessionId, &Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Register a callback that receives the payload struct directly.
    ///
    /// ```
    /// use slirc_client::dispatch::EventRegistry;
    /// use slirc_client::event::{Event, Joined, SessionId};
    /// use slirc_client::Source;
    ///
    /// let registry = EventRegistry::new();
    /// registry.on(|_session, joined: &Joined| println!("joined {}", joined.channel));
    /// registry.publish(
    ///     SessionId::new(1),
    ///     &Event::from(Joined {
    ///         channel: "#rust".into(),
    ///         source: Source::parse("me!u@h"),
    ///         account: None,
    ///         realname: None,
    ///         is_self: true,
    ///     }),
    /// );
    /// ```
    pub fn on<P, F>(&self, callback: F) -> SubscriptionId
    where
        P: EventPayload,
        F: Fn(SessionId, &P) + Send + Sync + 'static,
    {
        self.subscribe(P::KIND, move |session, event| {
            if let Some(payload) = P::from_event(event) {
                callback(session, payload);
            }
        })
    }

    /// Remove a callback. Returns whether it was registered under `kind`.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(list) = subscribers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sid, _)| *sid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(&kind);
        }
        removed
    }

    /// Number of callbacks registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to its subscribers.
    ///
    /// Callbacks run outside the table lock, so they may subscribe,
    /// unsubscribe or publish themselves.
    pub fn publish(&self, session: SessionId, event: &Event) {
        let callbacks: Vec<Callback> = match self.subscribers.read().get(&event.kind()) {
            Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return,
        };
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(session, event))).is_err() {
                error!(
                    %session,
                    kind = event.kind().as_str(),
                    "event subscriber panicked"
                );
            }
        }
    }
}
