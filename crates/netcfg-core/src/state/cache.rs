// ── Operational state cache ──
//
// Last known operational value of every path, per device. A device only
// has a cache once it has been initialized or has received an event.

use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{DeviceId, StateEvent, StateEventKind, TypedValue};

#[derive(Debug, Default)]
pub struct OperationalStateCache {
    devices: DashMap<DeviceId, BTreeMap<String, TypedValue>>,
}

impl OperationalStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every path for `device_id`, sorted by path.
    pub fn get(&self, device_id: &DeviceId) -> Result<BTreeMap<String, TypedValue>, CoreError> {
        self.devices
            .get(device_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| CoreError::NoCacheAvailable {
                device_id: device_id.to_string(),
            })
    }

    /// Mark `device_id` as synchronized with no paths, discarding any
    /// previous state.
    pub fn initialize(&self, device_id: DeviceId) {
        debug!(device = %device_id, "operational state initialized");
        self.devices.insert(device_id, BTreeMap::new());
    }

    /// Fold one state event into the cache.
    pub fn apply(&self, event: &StateEvent) {
        match event.kind {
            StateEventKind::Added | StateEventKind::Changed => {
                self.devices
                    .entry(event.device_id.clone())
                    .or_default()
                    .insert(event.path.clone(), event.value.clone());
            }
            StateEventKind::Removed => {
                if let Some(mut paths) = self.devices.get_mut(&event.device_id) {
                    paths.remove(&event.path);
                }
            }
        }
    }

    /// Forget a device entirely. Returns whether it had a cache.
    pub fn remove(&self, device_id: &DeviceId) -> bool {
        self.devices.remove(device_id).is_some()
    }

    pub fn devices(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.devices.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }
}
