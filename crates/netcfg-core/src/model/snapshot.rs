// ── Snapshot identifiers ──
//
// `<network id>:<device id>`. The device part is recovered by splitting at
// the first separator, so only the network part must be separator-free.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{DeviceId, ID_SEPARATOR};
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn new(network_id: &str, device_id: &DeviceId) -> Self {
        Self(format!("{network_id}{ID_SEPARATOR}{device_id}"))
    }

    /// Like [`new`](Self::new), but rejects components that would make the
    /// id ambiguous.
    pub fn try_new(network_id: &str, device_id: &DeviceId) -> Result<Self, CoreError> {
        for (what, part) in [("network id", network_id), ("device id", device_id.as_str())] {
            if part.contains(ID_SEPARATOR) {
                return Err(CoreError::validation(format!(
                    "{what} {part:?} must not contain '{ID_SEPARATOR}'"
                )));
            }
        }
        Ok(Self::new(network_id, device_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything after the first separator, or the whole id when there is none.
    pub fn device_id(&self) -> DeviceId {
        match self.0.split_once(ID_SEPARATOR) {
            Some((_, device)) => DeviceId::from(device),
            None => DeviceId::from(self.0.as_str()),
        }
    }

    /// Everything before the first separator, empty when there is none.
    pub fn network_id(&self) -> &str {
        self.0
            .split_once(ID_SEPARATOR)
            .map_or("", |(network, _)| network)
    }
}

impl From<String> for SnapshotId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
