// ── Watch sessions ──
//
// A `WatchSession` replays a snapshot of a change log and then follows it
// live. It ends when its cancellation token fires, when the log is closed,
// or when the caller closes or drops it; each path releases the hub
// registration exactly once.

mod filter;

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::debug;

pub use filter::WildcardMatcher;

use crate::hub::Registration;
use crate::model::{ChangeRecord, Revision};
use crate::store::ChangeEvent;

// ── WatchOptions ─────────────────────────────────────────────────────

/// How to open a watch.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Deliver every existing record before live events.
    pub replay: bool,
    /// Wildcard pattern over record ids. `None` or empty matches all.
    pub filter: Option<String>,
    /// End the session when this token is cancelled.
    pub cancel: Option<CancellationToken>,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replay(mut self, replay: bool) -> Self {
        self.replay = replay;
        self
    }

    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

// ── WatchSession ─────────────────────────────────────────────────────

/// Replay-then-live stream of [`ChangeEvent`]s from one log.
pub struct WatchSession<T: ChangeRecord> {
    id: String,
    replay: VecDeque<ChangeEvent<T>>,
    live: Option<mpsc::UnboundedReceiver<ChangeEvent<T>>>,
    /// Revision of the log when the replay snapshot was taken.
    high_water: Revision,
    filter: Option<WildcardMatcher>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    registration: Option<Registration<ChangeEvent<T>>>,
}

impl<T: ChangeRecord> WatchSession<T> {
    pub(crate) fn new(
        registration: Registration<ChangeEvent<T>>,
        live: mpsc::UnboundedReceiver<ChangeEvent<T>>,
        replay: VecDeque<ChangeEvent<T>>,
        high_water: Revision,
        filter: Option<WildcardMatcher>,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            id: registration.id().to_owned(),
            replay,
            live: Some(live),
            high_water,
            filter,
            cancelled: cancel.map(|token| Box::pin(token.cancelled_owned())),
            registration: Some(registration),
        }
    }

    /// Registration id, as listed by the log's `watchers()`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of replayed events not yet consumed.
    pub fn pending_replay(&self) -> usize {
        self.replay.len()
    }

    pub fn is_closed(&self) -> bool {
        self.registration.is_none()
    }

    /// Stop the session. Buffered events are discarded.
    pub fn close(&mut self) {
        if self.registration.take().is_some() {
            debug!(watch = %self.id, "watch closed");
        }
        self.live = None;
        self.cancelled = None;
        self.replay.clear();
    }

    fn accepts(&self, event: &ChangeEvent<T>) -> bool {
        event.revision > self.high_water
            && self
                .filter
                .as_ref()
                .is_none_or(|m| m.matches(event.change.record_id()))
    }
}

impl<T: ChangeRecord> Stream for WatchSession<T> {
    type Item = ChangeEvent<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(cancelled) = this.cancelled.as_mut() {
            if cancelled.as_mut().poll(cx).is_ready() {
                this.close();
                return Poll::Ready(None);
            }
        }

        if let Some(event) = this.replay.pop_front() {
            return Poll::Ready(Some(event));
        }

        loop {
            let Some(live) = this.live.as_mut() else {
                return Poll::Ready(None);
            };
            match live.poll_recv(cx) {
                Poll::Ready(Some(event)) => {
                    if this.accepts(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(None) => {
                    this.close();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::ChangeLog;
    use futures_util::StreamExt;
    use tokio_test::{assert_pending, assert_ready, task};

    #[derive(Debug, Clone)]
    struct Rec(String);

    impl ChangeRecord for Rec {
        fn record_id(&self) -> &str {
            &self.0
        }
    }

    fn rec(id: &str) -> Rec {
        Rec(id.to_owned())
    }

    #[tokio::test]
    async fn replay_then_live() {
        let log = ChangeLog::new("rec");
        log.append(rec("a")).await.unwrap();
        log.append(rec("b")).await.unwrap();

        let mut session = log
            .watch(WatchOptions::new().with_replay(true))
            .await
            .unwrap();
        assert_eq!(session.pending_replay(), 2);
        log.append(rec("c")).await.unwrap();

        let ids: Vec<String> = (&mut session)
            .take(3)
            .map(|e| e.change.0.clone())
            .collect()
            .await;
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn without_replay_only_live_events() {
        let log = ChangeLog::new("rec");
        log.append(rec("old")).await.unwrap();

        let mut session = log.watch(WatchOptions::new()).await.unwrap();
        log.append(rec("new")).await.unwrap();

        assert_eq!(session.next().await.unwrap().change.0, "new");
    }

    #[tokio::test]
    async fn filter_applies_to_replay_and_live() {
        let log = ChangeLog::new("rec");
        log.append(rec("net-1")).await.unwrap();
        log.append(rec("skip")).await.unwrap();

        let mut session = log
            .watch(WatchOptions::new().with_replay(true).with_filter("net-*"))
            .await
            .unwrap();
        log.append(rec("skip-2")).await.unwrap();
        log.append(rec("net-2")).await.unwrap();

        assert_eq!(session.next().await.unwrap().change.0, "net-1");
        assert_eq!(session.next().await.unwrap().change.0, "net-2");
    }

    #[tokio::test]
    async fn pending_until_next_append() {
        let log = ChangeLog::new("rec");
        let session = log.watch(WatchOptions::new()).await.unwrap();
        let mut polled = task::spawn(session);

        assert_pending!(polled.poll_next());
        log.append(rec("x")).await.unwrap();
        assert!(polled.is_woken());
        let event = assert_ready!(polled.poll_next());
        assert_eq!(event.unwrap().change.0, "x");
    }

    #[tokio::test]
    async fn cancellation_ends_session_and_releases_registration() {
        let log: ChangeLog<Rec> = ChangeLog::new("rec");
        let token = CancellationToken::new();
        let mut session = log
            .watch(WatchOptions::new().with_cancel(token.clone()))
            .await
            .unwrap();
        assert_eq!(log.watchers(), vec![session.id().to_owned()]);

        token.cancel();
        assert!(session.next().await.is_none());
        assert!(session.is_closed());
        assert!(log.watchers().is_empty());
    }

    #[tokio::test]
    async fn dropping_session_releases_registration() {
        let log: ChangeLog<Rec> = ChangeLog::new("rec");
        let session = log.watch(WatchOptions::new()).await.unwrap();
        assert_eq!(log.watchers().len(), 1);
        drop(session);
        assert!(log.watchers().is_empty());
    }

    #[tokio::test]
    async fn closing_log_ends_session() {
        let log: ChangeLog<Rec> = ChangeLog::new("rec");
        let mut session = log.watch(WatchOptions::new()).await.unwrap();
        log.close();
        assert!(session.next().await.is_none());
    }

    #[tokio::test]
    async fn explicit_close_is_idempotent() {
        let log: ChangeLog<Rec> = ChangeLog::new("rec");
        let mut session = log.watch(WatchOptions::new()).await.unwrap();
        session.close();
        session.close();
        assert!(log.watchers().is_empty());
        assert!(session.next().await.is_none());
    }
}
