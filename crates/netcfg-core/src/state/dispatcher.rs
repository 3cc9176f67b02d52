// ── Operational state dispatcher ──
//
// Fans every state event out to every registered listener. Listeners are
// keyed by caller-chosen ids and filter by device themselves.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::CoreError;
use crate::hub::{Hub, Registration};
use crate::model::StateEvent;

pub struct Dispatcher {
    hub: Hub<StateEvent>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            hub: Hub::new("operational state"),
        }
    }

    /// Register a listener. Ids must be unique among live listeners.
    pub fn register_listener(&self, id: impl Into<String>) -> Result<StateListener, CoreError> {
        let (registration, rx) = self.hub.register(id)?;
        Ok(StateListener {
            id: registration.id().to_owned(),
            events: Some(UnboundedReceiverStream::new(rx)),
            cancelled: None,
            registration: Some(registration),
        })
    }

    /// Remove a listener by id. Unknown ids are ignored.
    pub fn unregister_listener(&self, id: &str) -> bool {
        self.hub.unregister(id)
    }

    pub fn dispatch(&self, event: &StateEvent) {
        self.hub.publish(event);
    }

    /// Ids of every registered listener, sorted.
    pub fn listeners(&self) -> Vec<String> {
        self.hub.subscriptions()
    }

    pub(crate) fn close(&self) {
        self.hub.close();
    }
}

// ── StateListener ────────────────────────────────────────────────────

/// Stream of every dispatched [`StateEvent`], from registration on.
pub struct StateListener {
    id: String,
    events: Option<UnboundedReceiverStream<StateEvent>>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    registration: Option<Registration<StateEvent>>,
}

impl StateListener {
    /// End the stream when `token` is cancelled.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancelled = Some(Box::pin(token.cancelled_owned()));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn close(&mut self) {
        self.registration = None;
        self.events = None;
        self.cancelled = None;
    }
}

impl Stream for StateListener {
    type Item = StateEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(cancelled) = this.cancelled.as_mut() {
            if cancelled.as_mut().poll(cx).is_ready() {
                this.close();
                return Poll::Ready(None);
            }
        }

        let Some(events) = this.events.as_mut() else {
            return Poll::Ready(None);
        };
        let polled = Pin::new(events).poll_next(cx);
        if let Poll::Ready(None) = polled {
            this.close();
        }
        polled
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::TypedValue;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn dispatch_reaches_every_listener() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.register_listener("a").unwrap();
        let mut b = dispatcher.register_listener("b").unwrap();

        dispatcher.dispatch(&StateEvent::added("d1", "/x", TypedValue::Bool(true)));

        assert_eq!(a.next().await.unwrap().path, "/x");
        assert_eq!(b.next().await.unwrap().device_id.as_str(), "d1");
    }

    #[test]
    fn duplicate_listener_id_is_rejected() {
        let dispatcher = Dispatcher::new();
        let _first = dispatcher.register_listener("diags-1").unwrap();
        assert!(matches!(
            dispatcher.register_listener("diags-1"),
            Err(CoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn stale_listener_drop_keeps_newer_registration() {
        let dispatcher = Dispatcher::new();
        let stale = dispatcher.register_listener("l").unwrap();
        assert!(dispatcher.unregister_listener("l"));
        let _fresh = dispatcher.register_listener("l").unwrap();

        drop(stale);
        assert_eq!(dispatcher.listeners(), vec!["l".to_owned()]);
    }

    #[tokio::test]
    async fn cancelled_listener_ends_and_unregisters() {
        let dispatcher = Dispatcher::new();
        let token = CancellationToken::new();
        let mut listener = dispatcher
            .register_listener("l")
            .unwrap()
            .with_cancel(token.clone());

        token.cancel();
        assert!(listener.next().await.is_none());
        assert!(dispatcher.listeners().is_empty());
    }

    #[tokio::test]
    async fn unregister_ends_the_stream() {
        let dispatcher = Dispatcher::new();
        let mut listener = dispatcher.register_listener("l").unwrap();
        dispatcher.unregister_listener("l");
        assert!(listener.next().await.is_none());
    }
}
