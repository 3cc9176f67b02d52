// ── Change records ──
//
// Network changes group one device change per target device. Both are
// append-only records in their logs; only a network change's phase moves
// after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{DeviceChangeId, DeviceId, DeviceVersion, NetworkChangeId, VersionedDeviceId};
use super::value::TypedValue;

/// A record that can live in a [`ChangeLog`](crate::store::ChangeLog).
pub trait ChangeRecord: Clone + Send + Sync + 'static {
    /// Identifier used for uniqueness, lookups and wildcard filtering.
    fn record_id(&self) -> &str;
}

// ── PathValue ────────────────────────────────────────────────────────

/// A value (or a removal) at a configuration path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    pub path: String,
    pub value: TypedValue,
    #[serde(default)]
    pub removed: bool,
}

impl PathValue {
    pub fn new(path: impl Into<String>, value: TypedValue) -> Self {
        Self {
            path: path.into(),
            value,
            removed: false,
        }
    }

    /// A deletion of `path`.
    pub fn removal(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: TypedValue::Empty,
            removed: true,
        }
    }
}

// ── Phase ────────────────────────────────────────────────────────────

/// Lifecycle of a network change.
///
/// `PENDING -> APPLYING -> {APPLIED | FAILED}` and
/// `APPLIED -> ROLLING_BACK -> ROLLED_BACK`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Pending,
    Applying,
    Applied,
    Failed,
    RollingBack,
    RolledBack,
}

impl Phase {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Applying)
                | (Self::Applying, Self::Applied | Self::Failed)
                | (Self::Applied, Self::RollingBack)
                | (Self::RollingBack, Self::RolledBack)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::RolledBack)
    }
}

// ── DeviceChange ─────────────────────────────────────────────────────

/// The part of a network change targeting one device at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceChange {
    pub id: DeviceChangeId,
    pub network_change: NetworkChangeId,
    pub device_id: DeviceId,
    pub device_version: DeviceVersion,
    pub values: Vec<PathValue>,
    pub created: DateTime<Utc>,
}

impl DeviceChange {
    pub fn new(
        network_change: NetworkChangeId,
        device_id: DeviceId,
        device_version: DeviceVersion,
        values: Vec<PathValue>,
    ) -> Self {
        Self {
            id: DeviceChangeId::compose(&network_change, &device_id, &device_version),
            network_change,
            device_id,
            device_version,
            values,
            created: Utc::now(),
        }
    }

    pub fn key(&self) -> VersionedDeviceId {
        VersionedDeviceId {
            device_id: self.device_id.clone(),
            version: self.device_version.clone(),
        }
    }
}

impl ChangeRecord for DeviceChange {
    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Reference from a network change to one of its device changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceChangeRef {
    pub id: DeviceChangeId,
    pub device_id: DeviceId,
    pub device_version: DeviceVersion,
}

impl From<&DeviceChange> for DeviceChangeRef {
    fn from(change: &DeviceChange) -> Self {
        Self {
            id: change.id.clone(),
            device_id: change.device_id.clone(),
            device_version: change.device_version.clone(),
        }
    }
}

// ── NetworkChange ────────────────────────────────────────────────────

/// A named, network-wide configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkChange {
    pub id: NetworkChangeId,
    pub changes: Vec<DeviceChangeRef>,
    pub phase: Phase,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl NetworkChange {
    /// A new change in [`Phase::Pending`].
    pub fn new(id: NetworkChangeId, changes: Vec<DeviceChangeRef>) -> Self {
        let now = Utc::now();
        Self {
            id,
            changes,
            phase: Phase::Pending,
            created: now,
            updated: now,
        }
    }

    /// Copy of this change moved to `phase`, with `updated` refreshed.
    #[must_use]
    pub fn with_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            updated: Utc::now(),
            ..self.clone()
        }
    }
}

impl ChangeRecord for NetworkChange {
    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}
