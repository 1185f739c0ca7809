//! Topic-based publish/subscribe dispatcher.
//!
//! Background services publish onto the bus from their own threads; screen
//! modules subscribe in `on_load` and unsubscribe in `on_unload`. The registry
//! lock is held only while the handler list is copied, so handlers may
//! subscribe or unsubscribe without deadlocking. Such changes apply to the
//! next `publish`, not the one in flight.

use crate::error::panic_message;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Payload carried by an event.
pub type Payload = serde_json::Value;

type Handler = Arc<dyn Fn(&Payload) -> crate::Result<()> + Send + Sync>;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Thread-safe event dispatcher used to decouple services and modules.
pub struct EventBus {
    handlers: Mutex<HashMap<String, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Vec<(SubscriptionId, Handler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` to be invoked whenever `event` is published.
    pub fn subscribe<F>(&self, event: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Payload) -> crate::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        log::debug!("EventBus: subscribed {:?} to '{}'", id, event);
        id
    }

    /// Remove a subscription. Returns false if the topic or token is unknown.
    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let mut registry = self.registry();
        let Some(listeners) = registry.get_mut(event) else {
            return false;
        };
        let len_before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        let removed = listeners.len() < len_before;
        if listeners.is_empty() {
            registry.remove(event);
        }
        removed
    }

    /// Invoke every handler subscribed to `event` with `payload`.
    ///
    /// Handlers run synchronously on the caller's thread, in subscription
    /// order. A handler that errors or panics is logged and skipped; delivery
    /// to the rest continues. Returns the number of handlers that completed.
    pub fn publish(&self, event: &str, payload: Payload) -> usize {
        let listeners: Vec<Handler> = match self.registry().get(event) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for handler in listeners {
            match catch_unwind(AssertUnwindSafe(|| handler(&payload))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => log::error!("EventBus: handler for '{}' failed: {:#}", event, e),
                Err(panic) => log::error!(
                    "EventBus: handler for '{}' panicked: {}",
                    event,
                    panic_message(panic.as_ref())
                ),
            }
        }
        delivered
    }

    /// Number of handlers currently subscribed to `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.registry().get(event).map_or(0, Vec::len)
    }
}
