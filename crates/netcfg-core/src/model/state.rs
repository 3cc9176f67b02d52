// ── Operational state events ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::DeviceId;
use super::value::TypedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateEventKind {
    Added,
    Changed,
    Removed,
}

/// A change to one operational-state path on one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    pub kind: StateEventKind,
    pub device_id: DeviceId,
    pub path: String,
    pub value: TypedValue,
}

impl StateEvent {
    pub fn added(device_id: impl Into<DeviceId>, path: impl Into<String>, value: TypedValue) -> Self {
        Self {
            kind: StateEventKind::Added,
            device_id: device_id.into(),
            path: path.into(),
            value,
        }
    }

    pub fn changed(
        device_id: impl Into<DeviceId>,
        path: impl Into<String>,
        value: TypedValue,
    ) -> Self {
        Self {
            kind: StateEventKind::Changed,
            device_id: device_id.into(),
            path: path.into(),
            value,
        }
    }

    pub fn removed(device_id: impl Into<DeviceId>, path: impl Into<String>) -> Self {
        Self {
            kind: StateEventKind::Removed,
            device_id: device_id.into(),
            path: path.into(),
            value: TypedValue::Empty,
        }
    }
}
