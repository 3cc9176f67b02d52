// ── Append-ordered change log ──
//
// One log per scope (the network, or a device at a version). Records keep
// their creation order; updates replace a record in place and restamp its
// revision. Every mutation is published to watchers while the write lock
// is held, so all watchers observe the same total order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use strum::Display;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::CoreError;
use crate::hub::Hub;
use crate::model::{ChangeRecord, Revision};
use crate::stream::{WatchOptions, WatchSession, WildcardMatcher};

// ── ChangeEvent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeEventKind {
    Created,
    Updated,
}

/// A record as it was at `revision`.
pub struct ChangeEvent<T> {
    pub kind: ChangeEventKind,
    pub change: Arc<T>,
    pub revision: Revision,
}

impl<T> Clone for ChangeEvent<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            change: Arc::clone(&self.change),
            revision: self.revision,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ChangeEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("kind", &self.kind)
            .field("revision", &self.revision)
            .field("change", &self.change)
            .finish()
    }
}

// ── Internal state ───────────────────────────────────────────────────

struct Slot<T> {
    change: Arc<T>,
    revision: Revision,
}

struct LogState<T> {
    records: Vec<Slot<T>>,
    /// record id -> position in `records`.
    index: HashMap<String, usize>,
    revision: Revision,
}

impl<T: ChangeRecord> LogState<T> {
    fn get(&self, id: &str) -> Option<&Arc<T>> {
        self.index
            .get(id)
            .and_then(|&i| self.records.get(i))
            .map(|slot| &slot.change)
    }
}

// ── ChangeLog ────────────────────────────────────────────────────────

pub struct ChangeLog<T: ChangeRecord> {
    entity_type: &'static str,
    state: RwLock<LogState<T>>,
    hub: Hub<ChangeEvent<T>>,
}

impl<T: ChangeRecord> ChangeLog<T> {
    /// `entity_type` names the records in errors and logs.
    pub fn new(entity_type: &'static str) -> Self {
        Self {
            entity_type,
            state: RwLock::new(LogState {
                records: Vec::new(),
                index: HashMap::new(),
                revision: Revision::ZERO,
            }),
            hub: Hub::new(entity_type),
        }
    }

    /// Append a new record. Duplicate ids are rejected.
    pub async fn append(&self, change: T) -> Result<ChangeEvent<T>, CoreError> {
        let mut state = self.state.write().await;
        if self.hub.is_closed() {
            return Err(CoreError::ShuttingDown);
        }
        if state.index.contains_key(change.record_id()) {
            return Err(CoreError::already_exists(self.entity_type, change.record_id()));
        }
        Ok(self.commit_append(&mut state, change))
    }

    pub async fn get(&self, id: &str) -> Option<Arc<T>> {
        self.state.read().await.get(id).cloned()
    }

    /// Records in creation order, optionally filtered by id.
    pub async fn list(&self, filter: Option<&WildcardMatcher>) -> Vec<Arc<T>> {
        let state = self.state.read().await;
        state
            .records
            .iter()
            .filter(|slot| filter.is_none_or(|m| m.matches(slot.change.record_id())))
            .map(|slot| Arc::clone(&slot.change))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current revision (zero for an untouched log).
    pub async fn revision(&self) -> Revision {
        self.state.read().await.revision
    }

    /// Open a watch session.
    ///
    /// The live subscription is registered under the read lock together with
    /// the replay snapshot, so no mutation can fall between the two.
    pub async fn watch(&self, options: WatchOptions) -> Result<WatchSession<T>, CoreError> {
        let state = self.state.read().await;
        let (registration, rx) = self.hub.register_anonymous("watch")?;

        let filter = options
            .filter
            .as_deref()
            .map(WildcardMatcher::new)
            .filter(|m| !m.is_match_all());

        let replay = if options.replay {
            state
                .records
                .iter()
                .filter(|slot| filter.as_ref().is_none_or(|m| m.matches(slot.change.record_id())))
                .map(|slot| ChangeEvent {
                    kind: ChangeEventKind::Created,
                    change: Arc::clone(&slot.change),
                    revision: slot.revision,
                })
                .collect()
        } else {
            Default::default()
        };
        let high_water = state.revision;
        drop(state);

        debug!(
            log = self.entity_type,
            watch = registration.id(),
            replay = options.replay,
            %high_water,
            "watch opened"
        );
        Ok(WatchSession::new(
            registration,
            rx,
            replay,
            high_water,
            filter,
            options.cancel,
        ))
    }

    /// Run `f` against the log under the write lock.
    ///
    /// Mutations staged on the transaction are applied, in order, only if
    /// `f` returns `Ok`; each one is published as its own event.
    pub async fn update<R, F>(&self, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut LogTxn<'_, T>) -> Result<R, CoreError>,
    {
        let mut state = self.state.write().await;
        if self.hub.is_closed() {
            return Err(CoreError::ShuttingDown);
        }

        let mut txn = LogTxn {
            entity_type: self.entity_type,
            committed: &state,
            staged: Vec::new(),
        };
        let result = f(&mut txn)?;
        let staged = txn.staged;

        for op in staged {
            match op {
                Staged::Append(change) => {
                    self.commit_append(&mut state, change);
                }
                Staged::Replace(change) => self.commit_replace(&mut state, change),
            }
        }
        Ok(result)
    }

    /// Ids of every open watch session.
    pub fn watchers(&self) -> Vec<String> {
        self.hub.subscriptions()
    }

    /// End every open watch session and refuse new mutations.
    pub fn close(&self) {
        self.hub.close();
    }

    /// Drop a record whose enclosing change never committed.
    ///
    /// Nothing is published and the revision is left alone. Works on a
    /// closed log.
    pub(crate) async fn remove(&self, id: &str) -> Option<Arc<T>> {
        let mut state = self.state.write().await;
        let position = state.index.remove(id)?;
        let slot = state.records.remove(position);
        for i in state.index.values_mut() {
            if *i > position {
                *i -= 1;
            }
        }
        debug!(log = self.entity_type, %id, "record removed");
        Some(slot.change)
    }

    /// No records and no watchers. A log busy with a writer is not idle.
    pub(crate) fn is_idle(&self) -> bool {
        self.hub.subscriptions().is_empty()
            && self
                .state
                .try_read()
                .is_ok_and(|state| state.records.is_empty())
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn commit_append(&self, state: &mut LogState<T>, change: T) -> ChangeEvent<T> {
        state.revision = state.revision.next();
        let revision = state.revision;
        let id = change.record_id().to_owned();
        let change = Arc::new(change);

        state.index.insert(id.clone(), state.records.len());
        state.records.push(Slot {
            change: Arc::clone(&change),
            revision,
        });

        let event = ChangeEvent {
            kind: ChangeEventKind::Created,
            change,
            revision,
        };
        self.hub.publish(&event);
        debug!(log = self.entity_type, %id, %revision, "record appended");
        event
    }

    fn commit_replace(&self, state: &mut LogState<T>, change: T) {
        let Some(&position) = state.index.get(change.record_id()) else {
            // Staging already checked existence and nothing else holds the lock.
            return;
        };
        state.revision = state.revision.next();
        let revision = state.revision;
        let change = Arc::new(change);

        if let Some(slot) = state.records.get_mut(position) {
            slot.change = Arc::clone(&change);
            slot.revision = revision;
        }

        let id = change.record_id().to_owned();
        self.hub.publish(&ChangeEvent {
            kind: ChangeEventKind::Updated,
            change,
            revision,
        });
        debug!(log = self.entity_type, %id, %revision, "record updated");
    }
}

// ── LogTxn ───────────────────────────────────────────────────────────

enum Staged<T> {
    Append(T),
    Replace(T),
}

impl<T: ChangeRecord> Staged<T> {
    fn record(&self) -> &T {
        match self {
            Self::Append(t) | Self::Replace(t) => t,
        }
    }
}

/// View of a log inside [`ChangeLog::update`].
///
/// Reads see committed records overlaid with whatever this transaction has
/// staged so far.
pub struct LogTxn<'a, T: ChangeRecord> {
    entity_type: &'static str,
    committed: &'a LogState<T>,
    staged: Vec<Staged<T>>,
}

impl<T: ChangeRecord> LogTxn<'_, T> {
    /// Latest view of `id`, staged or committed.
    pub fn get(&self, id: &str) -> Option<T> {
        self.staged
            .iter()
            .rev()
            .map(Staged::record)
            .find(|t| t.record_id() == id)
            .cloned()
            .or_else(|| self.committed.get(id).map(|arc| T::clone(arc)))
    }

    /// Latest view of every record, in creation order.
    pub fn records(&self) -> Vec<T> {
        let mut ids: Vec<&str> = self
            .committed
            .records
            .iter()
            .map(|slot| slot.change.record_id())
            .collect();
        for op in &self.staged {
            if let Staged::Append(t) = op {
                ids.push(t.record_id());
            }
        }
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn append(&mut self, change: T) -> Result<(), CoreError> {
        if self.get(change.record_id()).is_some() {
            return Err(CoreError::already_exists(self.entity_type, change.record_id()));
        }
        self.staged.push(Staged::Append(change));
        Ok(())
    }

    /// Replace an existing record with a new version of itself.
    pub fn replace(&mut self, change: T) -> Result<(), CoreError> {
        if self.get(change.record_id()).is_none() {
            return Err(CoreError::not_found(self.entity_type, change.record_id()));
        }
        self.staged.push(Staged::Replace(change));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[derive(Debug, Clone, PartialEq)]
    struct Rec {
        id: String,
        body: u32,
    }

    impl Rec {
        fn new(id: &str, body: u32) -> Self {
            Self {
                id: id.to_owned(),
                body,
            }
        }
    }

    impl ChangeRecord for Rec {
        fn record_id(&self) -> &str {
            &self.id
        }
    }

    #[tokio::test]
    async fn append_assigns_increasing_revisions() {
        let log = ChangeLog::new("rec");
        let a = log.append(Rec::new("a", 1)).await.unwrap();
        let b = log.append(Rec::new("b", 2)).await.unwrap();
        assert!(b.revision > a.revision);
        assert_eq!(log.revision().await, b.revision);
    }

    #[tokio::test]
    async fn duplicate_append_is_rejected_and_state_unchanged() {
        let log = ChangeLog::new("rec");
        log.append(Rec::new("a", 1)).await.unwrap();
        let err = log.append(Rec::new("a", 2)).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
        assert_eq!(log.get("a").await.unwrap().body, 1);
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn list_keeps_creation_order_and_filters() {
        let log = ChangeLog::new("rec");
        for id in ["net-2", "net-1", "other"] {
            log.append(Rec::new(id, 0)).await.unwrap();
        }
        let ids: Vec<String> = log
            .list(None)
            .await
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(ids, ["net-2", "net-1", "other"]);

        let matcher = WildcardMatcher::new("net-*");
        assert_eq!(log.list(Some(&matcher)).await.len(), 2);
    }

    #[tokio::test]
    async fn update_applies_only_on_success() {
        let log = ChangeLog::new("rec");
        log.append(Rec::new("a", 1)).await.unwrap();

        let err = log
            .update(|txn| {
                txn.replace(Rec::new("a", 2))?;
                Err::<(), _>(CoreError::validation("nope"))
            })
            .await;
        assert!(err.is_err());
        assert_eq!(log.get("a").await.unwrap().body, 1);

        log.update(|txn| txn.replace(Rec::new("a", 3))).await.unwrap();
        assert_eq!(log.get("a").await.unwrap().body, 3);
    }

    #[tokio::test]
    async fn txn_reads_see_staged_writes() {
        let log = ChangeLog::new("rec");
        log.append(Rec::new("a", 1)).await.unwrap();

        log.update(|txn| {
            txn.replace(Rec::new("a", 5))?;
            txn.append(Rec::new("b", 6))?;
            assert_eq!(txn.get("a").unwrap().body, 5);
            let bodies: Vec<u32> = txn.records().iter().map(|r| r.body).collect();
            assert_eq!(bodies, [5, 6]);
            Ok(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn replace_of_unknown_record_fails() {
        let log: ChangeLog<Rec> = ChangeLog::new("rec");
        let err = log.update(|txn| txn.replace(Rec::new("ghost", 0))).await;
        assert!(matches!(err, Err(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn each_staged_mutation_emits_an_event() {
        let log = ChangeLog::new("rec");
        log.append(Rec::new("a", 1)).await.unwrap();
        let mut watch = log.watch(WatchOptions::new()).await.unwrap();

        log.update(|txn| {
            txn.replace(Rec::new("a", 2))?;
            txn.replace(Rec::new("a", 3))
        })
        .await
        .unwrap();

        let first = watch.next().await.unwrap();
        let second = watch.next().await.unwrap();
        assert_eq!(first.kind, ChangeEventKind::Updated);
        assert_eq!(first.change.body, 2);
        assert_eq!(second.change.body, 3);
        assert!(second.revision > first.revision);
    }

    #[tokio::test]
    async fn remove_keeps_remaining_order_and_lookups() {
        let log = ChangeLog::new("rec");
        for id in ["a", "b", "c"] {
            log.append(Rec::new(id, 0)).await.unwrap();
        }

        let before = log.revision().await;
        assert_eq!(log.remove("b").await.unwrap().id, "b");
        assert!(log.remove("b").await.is_none());

        let ids: Vec<String> = log.list(None).await.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(log.get("c").await.unwrap().id, "c");
        assert_eq!(log.revision().await, before);
    }

    #[tokio::test]
    async fn idle_means_no_records_and_no_watchers() {
        let log: ChangeLog<Rec> = ChangeLog::new("rec");
        assert!(log.is_idle());

        let session = log.watch(WatchOptions::new()).await.unwrap();
        assert!(!log.is_idle());
        drop(session);
        assert!(log.is_idle());

        log.append(Rec::new("a", 0)).await.unwrap();
        assert!(!log.is_idle());
    }

    #[tokio::test]
    async fn close_refuses_mutations() {
        let log = ChangeLog::new("rec");
        log.close();
        assert!(matches!(
            log.append(Rec::new("a", 1)).await,
            Err(CoreError::ShuttingDown)
        ));
    }
}
