// ── Typed request and response structs ──
//
// Payloads for the `Manager` mutation surface and the `Service` query
// streams. Responses share records with the stores through `Arc`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::model::{
    DeviceChange, DeviceId, DeviceVersion, NetworkChange, PathValue, StateEventKind,
};

// ── Submit ─────────────────────────────────────────────────────────

/// A new network change, one entry per target device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Change name. A UUID is generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub changes: Vec<DeviceChangeRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceChangeRequest {
    pub device_id: DeviceId,
    pub device_version: DeviceVersion,
    pub values: Vec<PathValue>,
}

impl DeviceChangeRequest {
    pub fn new(
        device_id: impl Into<DeviceId>,
        device_version: impl Into<DeviceVersion>,
        values: Vec<PathValue>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_version: device_version.into(),
            values,
        }
    }
}

// ── Change listing ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListNetworkChangesRequest {
    /// Wildcard over change names; empty matches all.
    #[serde(default)]
    pub change_id: String,
    /// Keep streaming live changes after the snapshot.
    #[serde(default)]
    pub subscribe: bool,
    /// With `subscribe`, skip the existing changes.
    #[serde(default)]
    pub without_replay: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListNetworkChangesResponse {
    pub change: Arc<NetworkChange>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDeviceChangesRequest {
    pub device_id: DeviceId,
    pub device_version: DeviceVersion,
    #[serde(default)]
    pub subscribe: bool,
    #[serde(default)]
    pub without_replay: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListDeviceChangesResponse {
    pub change: Arc<DeviceChange>,
}

// ── Rollback ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResponse {
    pub message: String,
}

// ── Operational state ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpStateRequest {
    pub device_id: DeviceId,
    #[serde(default)]
    pub subscribe: bool,
}

/// `None` marks an entry from the initial snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    None,
    Added,
    Changed,
    Removed,
}

impl From<StateEventKind> for EventType {
    fn from(kind: StateEventKind) -> Self {
        match kind {
            StateEventKind::Added => Self::Added,
            StateEventKind::Changed => Self::Changed,
            StateEventKind::Removed => Self::Removed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpStateResponse {
    pub kind: EventType,
    pub path_value: PathValue,
}
