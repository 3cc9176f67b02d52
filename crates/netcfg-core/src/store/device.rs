// ── Device change store ──
//
// One change log per device at a model version. Logs are created on first
// use, so a watch on a device with no changes yet stays open for the first
// one. Logs left with no records and no watchers are pruned when the next
// watch opens.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::log::ChangeLog;
use crate::error::CoreError;
use crate::model::{ChangeRecord, DeviceChange, DeviceChangeId, VersionedDeviceId};
use crate::stream::{WatchOptions, WatchSession};

const ENTITY: &str = "device change";

#[derive(Default)]
pub struct DeviceChangeStore {
    logs: DashMap<VersionedDeviceId, Arc<ChangeLog<DeviceChange>>>,
    /// Held shared from log lookup until the log is used; pruning takes it
    /// exclusively so it never drops a log someone is about to use.
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl DeviceChangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change to its device's log.
    pub async fn create(&self, change: DeviceChange) -> Result<Arc<DeviceChange>, CoreError> {
        let _gate = self.gate.read().await;
        let log = self.log_for(&change.key())?;
        let event = log.append(change).await?;
        Ok(event.change)
    }

    /// Take back a change whose network change was never recorded.
    pub(crate) async fn remove(&self, change: &DeviceChange) -> Option<Arc<DeviceChange>> {
        let log = self.existing(&change.key())?;
        log.remove(change.record_id()).await
    }

    pub async fn get(
        &self,
        key: &VersionedDeviceId,
        id: &DeviceChangeId,
    ) -> Result<Arc<DeviceChange>, CoreError> {
        let log = self.existing(key);
        let found = match log {
            Some(log) => log.get(id.as_str()).await,
            None => None,
        };
        found.ok_or_else(|| CoreError::not_found(ENTITY, id.as_str()))
    }

    /// Changes for `key` in creation order. Unknown keys have none.
    pub async fn list(&self, key: &VersionedDeviceId) -> Vec<Arc<DeviceChange>> {
        match self.existing(key) {
            Some(log) => log.list(None).await,
            None => Vec::new(),
        }
    }

    pub async fn watch(
        &self,
        key: &VersionedDeviceId,
        options: WatchOptions,
    ) -> Result<WatchSession<DeviceChange>, CoreError> {
        self.prune();
        let _gate = self.gate.read().await;
        self.log_for(key)?.watch(options).await
    }

    /// Every device/version pair that has a log, sorted.
    pub fn devices(&self) -> Vec<VersionedDeviceId> {
        let mut keys: Vec<VersionedDeviceId> = self.logs.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Active watch sessions, paired with the device they watch.
    pub fn watchers(&self) -> Vec<(VersionedDeviceId, String)> {
        let mut out: Vec<(VersionedDeviceId, String)> = self
            .logs
            .iter()
            .flat_map(|r| {
                let key = r.key().clone();
                r.value()
                    .watchers()
                    .into_iter()
                    .map(move |id| (key.clone(), id))
            })
            .collect();
        out.sort();
        out
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for log in &self.logs {
            log.value().close();
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Drop idle logs. Skipped while any create or watch is in flight.
    fn prune(&self) {
        let Ok(_gate) = self.gate.try_write() else {
            return;
        };
        let before = self.logs.len();
        self.logs.retain(|_, log| !log.is_idle());
        let pruned = before.saturating_sub(self.logs.len());
        if pruned > 0 {
            debug!(pruned, "idle device change logs pruned");
        }
    }

    /// Clone the log handle out so no map guard is held across an await.
    fn existing(&self, key: &VersionedDeviceId) -> Option<Arc<ChangeLog<DeviceChange>>> {
        self.logs.get(key).map(|r| Arc::clone(r.value()))
    }

    fn log_for(&self, key: &VersionedDeviceId) -> Result<Arc<ChangeLog<DeviceChange>>, CoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CoreError::ShuttingDown);
        }
        let log = Arc::clone(
            self.logs
                .entry(key.clone())
                .or_insert_with(|| Arc::new(ChangeLog::new(ENTITY)))
                .value(),
        );
        if self.closed.load(Ordering::Acquire) {
            log.close();
            return Err(CoreError::ShuttingDown);
        }
        Ok(log)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{PathValue, TypedValue};
    use futures_util::StreamExt;

    fn change(net: &str, device: &str, version: &str) -> DeviceChange {
        DeviceChange::new(
            net.into(),
            device.into(),
            version.into(),
            vec![PathValue::new("/a", TypedValue::string(net))],
        )
    }

    #[tokio::test]
    async fn changes_are_partitioned_by_device_and_version() {
        let store = DeviceChangeStore::new();
        store.create(change("n1", "d1", "1.0")).await.unwrap();
        store.create(change("n2", "d1", "1.0")).await.unwrap();
        store.create(change("n1", "d1", "2.0")).await.unwrap();

        let v1 = VersionedDeviceId::new("d1", "1.0");
        let ids: Vec<String> = store
            .list(&v1)
            .await
            .iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, ["n1:d1:1.0", "n2:d1:1.0"]);
        assert_eq!(store.devices().len(), 2);
    }

    #[tokio::test]
    async fn unknown_device_lists_empty() {
        let store = DeviceChangeStore::new();
        assert!(store.list(&VersionedDeviceId::new("x", "1")).await.is_empty());
    }

    #[tokio::test]
    async fn get_by_key_and_id() {
        let store = DeviceChangeStore::new();
        let created = store.create(change("n1", "d1", "1.0")).await.unwrap();
        let key = created.key();

        let found = store.get(&key, &created.id).await.unwrap();
        assert_eq!(found.network_change.as_str(), "n1");
        assert!(matches!(
            store.get(&key, &"missing".into()).await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn watch_before_first_change_sees_it() {
        let store = DeviceChangeStore::new();
        let key = VersionedDeviceId::new("d1", "1.0");
        let mut watch = store.watch(&key, WatchOptions::new()).await.unwrap();
        assert_eq!(store.watchers(), vec![(key.clone(), watch.id().to_owned())]);

        store.create(change("n1", "d1", "1.0")).await.unwrap();
        assert_eq!(watch.next().await.unwrap().change.id.as_str(), "n1:d1:1.0");
    }

    #[tokio::test]
    async fn released_watch_on_unused_device_is_pruned() {
        let store = DeviceChangeStore::new();
        store.create(change("n1", "d1", "1.0")).await.unwrap();

        let typo = VersionedDeviceId::new("dl", "1.0");
        let watch = store.watch(&typo, WatchOptions::new()).await.unwrap();
        assert_eq!(store.devices().len(), 2);

        // Still watched, so the next watch keeps it.
        let d1 = VersionedDeviceId::new("d1", "1.0");
        let other = store.watch(&d1, WatchOptions::new()).await.unwrap();
        assert_eq!(store.devices().len(), 2);

        drop(watch);
        drop(other);
        let _again = store.watch(&d1, WatchOptions::new()).await.unwrap();
        assert_eq!(store.devices(), vec![d1]);
    }

    #[tokio::test]
    async fn removed_change_is_no_longer_listed() {
        let store = DeviceChangeStore::new();
        let kept = change("n1", "d1", "1.0");
        let dropped = change("n2", "d1", "1.0");
        store.create(kept.clone()).await.unwrap();
        store.create(dropped.clone()).await.unwrap();

        assert!(store.remove(&dropped).await.is_some());
        let listed = store.list(&dropped.key()).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept.id);
        assert!(store.get(&dropped.key(), &dropped.id).await.is_err());
    }

    #[tokio::test]
    async fn close_ends_watches_and_refuses_new_ones() {
        let store = DeviceChangeStore::new();
        let key = VersionedDeviceId::new("d1", "1.0");
        let mut watch = store.watch(&key, WatchOptions::new()).await.unwrap();

        store.close();
        assert!(watch.next().await.is_none());
        assert!(matches!(
            store.create(change("n1", "d1", "1.0")).await,
            Err(CoreError::ShuttingDown)
        ));
    }
}
