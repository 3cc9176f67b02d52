// ── Subscription hub ──
//
// Registration table shared by change logs and the state dispatcher.
// Each subscriber owns an unbounded channel so a publish never blocks and
// never drops a committed event. Subscribers whose receiver is gone are
// pruned on the next publish.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::CoreError;

struct Subscriber<E> {
    token: u64,
    tx: mpsc::UnboundedSender<E>,
}

struct HubInner<E> {
    name: &'static str,
    subscribers: DashMap<String, Subscriber<E>>,
    next_token: AtomicU64,
    closed: AtomicBool,
}

/// Fan-out point for events of type `E`. Cheap to clone.
pub(crate) struct Hub<E> {
    inner: Arc<HubInner<E>>,
}

impl<E> Clone for Hub<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Clone + Send + 'static> Hub<E> {
    /// `name` only shows up in logs.
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(HubInner {
                name,
                subscribers: DashMap::new(),
                next_token: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a subscriber under `id`.
    ///
    /// Fails with `AlreadyExists` if `id` is taken and with `ShuttingDown`
    /// once the hub is closed.
    pub(crate) fn register(
        &self,
        id: impl Into<String>,
    ) -> Result<(Registration<E>, mpsc::UnboundedReceiver<E>), CoreError> {
        let id = id.into();
        if self.is_closed() {
            return Err(CoreError::ShuttingDown);
        }

        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        match self.inner.subscribers.entry(id.clone()) {
            Entry::Occupied(_) => return Err(CoreError::already_exists("subscription", id)),
            Entry::Vacant(slot) => {
                slot.insert(Subscriber { token, tx });
            }
        }

        let registration = Registration {
            id,
            token,
            hub: Arc::downgrade(&self.inner),
        };

        // Lost a race with `close()`: back out so the receiver still ends.
        if self.is_closed() {
            drop(registration);
            return Err(CoreError::ShuttingDown);
        }

        debug!(hub = self.inner.name, id = %registration.id, "subscriber registered");
        Ok((registration, rx))
    }

    /// Register under a generated id of the form `<prefix>-<n>`.
    pub(crate) fn register_anonymous(
        &self,
        prefix: &str,
    ) -> Result<(Registration<E>, mpsc::UnboundedReceiver<E>), CoreError> {
        let n = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        self.register(format!("{prefix}-{n}"))
    }

    /// Remove `id`. Returns whether a subscriber was removed.
    pub(crate) fn unregister(&self, id: &str) -> bool {
        let removed = self.inner.subscribers.remove(id).is_some();
        if removed {
            debug!(hub = self.inner.name, id, "subscriber unregistered");
        }
        removed
    }

    /// Deliver `event` to every live subscriber.
    pub(crate) fn publish(&self, event: &E) {
        let name = self.inner.name;
        self.inner.subscribers.retain(|id, sub| {
            let alive = sub.tx.send(event.clone()).is_ok();
            if !alive {
                debug!(hub = name, id = %id, "pruning closed subscriber");
            }
            alive
        });
    }

    /// Ids of every current subscriber, sorted.
    pub(crate) fn subscriptions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .subscribers
            .iter()
            .map(|r| r.key().clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Refuse new subscribers and end every open one.
    pub(crate) fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            let count = self.inner.subscribers.len();
            self.inner.subscribers.clear();
            debug!(hub = self.inner.name, count, "hub closed");
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

// ── Registration ─────────────────────────────────────────────────────

/// Proof of a hub subscription. Dropping it unregisters the subscriber,
/// unless the id has since been taken over by a newer registration.
pub(crate) struct Registration<E> {
    id: String,
    token: u64,
    hub: Weak<HubInner<E>>,
}

impl<E> Registration<E> {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }
}

impl<E> Drop for Registration<E> {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            let token = self.token;
            if hub
                .subscribers
                .remove_if(&self.id, |_, sub| sub.token == token)
                .is_some()
            {
                debug!(hub = hub.name, id = %self.id, "subscription released");
            }
        }
    }
}
