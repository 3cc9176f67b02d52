// ── Domain model ──
//
// Canonical value, identity and change types shared by the codec, the
// stores and the service surface.

pub mod change;
pub mod ids;
pub mod snapshot;
pub mod state;
pub mod value;

// ── Re-exports ──────────────────────────────────────────────────────

pub use change::{ChangeRecord, DeviceChange, DeviceChangeRef, NetworkChange, PathValue, Phase};
pub use ids::{
    DeviceChangeId, DeviceId, DeviceVersion, ID_SEPARATOR, NetworkChangeId, Revision,
    VersionedDeviceId,
};
pub use snapshot::SnapshotId;
pub use state::{StateEvent, StateEventKind};
pub use value::{Decimal, LeafList, RawValue, TypedValue, ValueType, Width};
