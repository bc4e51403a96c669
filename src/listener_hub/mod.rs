//! ListenerHub - State Fan-out to UI Subscribers
//!
//! ## Responsibilities
//!
//! - Register callback subscribers in order
//! - Deliver each published payload to every subscriber synchronously
//! - Isolate panicking subscribers from the rest
//! - Channel subscribers for consumers living on another task
//!
//! Note: Listeners are invoked outside the registry lock, so a callback may
//! subscribe or unsubscribe without deadlocking.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;
use uuid::Uuid;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listener<T> {
    id: Uuid,
    callback: Callback<T>,
}

struct ChannelSubscriber<T> {
    id: Uuid,
    tx: mpsc::UnboundedSender<T>,
}

struct Registry<T> {
    listeners: Vec<Listener<T>>,
    channels: Vec<ChannelSubscriber<T>>,
}

/// Typed observer list
pub struct ListenerHub<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

/// Handle returned by [`ListenerHub::subscribe`]
pub struct Subscription {
    id: Uuid,
    remove: Option<Box<dyn FnOnce(Uuid) + Send + Sync>>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop receiving updates
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<T> ListenerHub<T>
where
    T: Clone + Send + 'static,
{
    /// Create new ListenerHub
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                listeners: Vec::new(),
                channels: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `callback` and deliver `current` to it once
    pub fn subscribe<F>(&self, callback: F, current: &T) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let callback: Callback<T> = Arc::new(callback);

        self.lock().listeners.push(Listener {
            id,
            callback: callback.clone(),
        });
        tracing::debug!(listener_id = %id, "Listener subscribed");

        deliver(id, &callback, current);

        let registry: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            id,
            remove: Some(Box::new(move |id| {
                if let Some(registry) = registry.upgrade() {
                    let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                    registry.listeners.retain(|l| l.id != id);
                    tracing::debug!(listener_id = %id, "Listener unsubscribed");
                }
            })),
        }
    }

    /// Register a channel subscriber, seeded with `current`
    pub fn subscribe_channel(&self, current: &T) -> mpsc::UnboundedReceiver<T> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive here, so the seed send cannot fail
        let _ = tx.send(current.clone());
        self.lock().channels.push(ChannelSubscriber { id, tx });
        tracing::debug!(channel_id = %id, "Channel subscriber registered");
        rx
    }

    /// Deliver `payload` to every subscriber in registration order
    pub fn publish(&self, payload: &T) {
        let (callbacks, senders): (Vec<_>, Vec<_>) = {
            let registry = self.lock();
            (
                registry
                    .listeners
                    .iter()
                    .map(|l| (l.id, l.callback.clone()))
                    .collect(),
                registry
                    .channels
                    .iter()
                    .map(|c| (c.id, c.tx.clone()))
                    .collect(),
            )
        };

        for (id, callback) in &callbacks {
            deliver(*id, callback, payload);
        }

        let mut closed = Vec::new();
        for (id, tx) in senders {
            if tx.send(payload.clone()).is_err() {
                closed.push(id);
            }
        }
        if !closed.is_empty() {
            self.lock().channels.retain(|c| !closed.contains(&c.id));
            tracing::debug!(count = closed.len(), "Pruned closed channel subscribers");
        }
    }

    /// Number of callback plus channel subscribers
    pub fn len(&self) -> usize {
        let registry = self.lock();
        registry.listeners.len() + registry.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every subscriber
    pub fn clear(&self) {
        let mut registry = self.lock();
        registry.listeners.clear();
        registry.channels.clear();
    }
}

impl<T> Default for ListenerHub<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn deliver<T>(id: Uuid, callback: &Callback<T>, payload: &T) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(payload))) {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(listener_id = %id, error = %reason, "Error in detection listener");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_delivers_current_immediately() {
        let hub = ListenerHub::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let _sub = hub.subscribe(move |v| sink.lock().unwrap().push(*v), &7);
        assert_eq!(*seen.lock().unwrap(), vec![7]);

        hub.publish(&8);
        assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_publish_in_registration_order() {
        let hub = ListenerHub::<u32>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let order = order.clone();
            let _ = hub.subscribe(move |_| order.lock().unwrap().push(name), &0);
        }
        order.lock().unwrap().clear();

        hub.publish(&1);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hub = ListenerHub::<u32>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let sub = hub.subscribe(move |_| { counter.fetch_add(1, Ordering::SeqCst); }, &0);
        sub.unsubscribe();
        hub.publish(&1);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let hub = ListenerHub::<u32>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let _bad = hub.subscribe(
            |v| {
                if *v > 0 {
                    panic!("listener failure");
                }
            },
            &0,
        );
        let _good = hub.subscribe(move |_| { counter.fetch_add(1, Ordering::SeqCst); }, &0);

        hub.publish(&1);
        hub.publish(&2);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself_without_deadlock() {
        let hub = Arc::new(ListenerHub::<u32>::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_in = slot.clone();

        let sub = hub.subscribe(
            move |v| {
                if *v == 1 {
                    if let Some(sub) = slot_in.lock().unwrap().take() {
                        sub.unsubscribe();
                    }
                }
            },
            &0,
        );
        *slot.lock().unwrap() = Some(sub);

        hub.publish(&1);
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_channel_subscriber_receives_seed_and_updates() {
        let hub = ListenerHub::<u32>::new();
        let mut rx = hub.subscribe_channel(&1);
        hub.publish(&2);

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[test]
    fn test_closed_channel_is_pruned() {
        let hub = ListenerHub::<u32>::new();
        let rx = hub.subscribe_channel(&1);
        drop(rx);
        hub.publish(&2);
        assert!(hub.is_empty());
    }
}
