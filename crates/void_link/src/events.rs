//! Synchronous notification signals
//!
//! A [`Signal`] delivers a value to every live subscriber, in subscription
//! order, on the thread that emits it. Subscribing returns a [`Connection`]
//! that keeps the subscription alive: dropping it silently ends delivery,
//! passing it to [`Signal::disconnect`] ends it immediately.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Subscriber ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// Subscription token; must be held for the subscription to stay alive
#[derive(Debug)]
#[must_use = "dropping a Connection ends the subscription"]
pub struct Connection {
    id: SubscriberId,
    _alive: Arc<()>,
}

impl Connection {
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slot<T> {
    id: SubscriberId,
    alive: Weak<()>,
    handler: Handler<T>,
}

/// Subscription registry for one kind of notification
pub struct Signal<T> {
    slots: Mutex<Vec<Slot<T>>>,
    next_subscriber_id: AtomicU64,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// Subscribe a handler
    pub fn connect<F>(&self, handler: F) -> Connection
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        let alive = Arc::new(());
        self.slots.lock().push(Slot {
            id,
            alive: Arc::downgrade(&alive),
            handler: Arc::new(handler),
        });
        Connection { id, _alive: alive }
    }

    /// End a subscription; a no-op if it already ended
    pub fn disconnect(&self, connection: Connection) {
        self.slots.lock().retain(|slot| slot.id != connection.id);
    }

    /// Deliver `value` to every live subscriber.
    ///
    /// Handlers run without the registry locked, so they may connect or
    /// disconnect on this same signal.
    pub fn emit(&self, value: &T) {
        let handlers: Vec<Handler<T>> = {
            let mut slots = self.slots.lock();
            slots.retain(|slot| slot.alive.strong_count() > 0);
            slots.iter().map(|slot| Arc::clone(&slot.handler)).collect()
        };
        for handler in handlers {
            handler(value);
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.alive.strong_count() > 0)
            .count()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
