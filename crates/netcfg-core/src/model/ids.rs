// ── Identity types ──
//
// String newtypes for every kind of identifier in the store, plus the
// composite key that partitions device changes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separator used inside composite identifiers.
pub const ID_SEPARATOR: char = ':';

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::new(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Target device identifier, e.g. `"device-1"`.
    DeviceId
);
string_id!(
    /// Model version of a device, e.g. `"1.0.0"`.
    DeviceVersion
);
string_id!(
    /// Name of a network change. Unique across the network store.
    NetworkChangeId
);
string_id!(
    /// `<network change>:<device>:<version>`.
    DeviceChangeId
);

impl DeviceChangeId {
    pub fn compose(
        network_change: &NetworkChangeId,
        device_id: &DeviceId,
        version: &DeviceVersion,
    ) -> Self {
        Self(format!(
            "{network_change}{ID_SEPARATOR}{device_id}{ID_SEPARATOR}{version}"
        ))
    }
}

// ── VersionedDeviceId ────────────────────────────────────────────────

/// Partition key for device changes: a device at a specific model version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionedDeviceId {
    pub device_id: DeviceId,
    pub version: DeviceVersion,
}

impl VersionedDeviceId {
    pub fn new(device_id: impl Into<DeviceId>, version: impl Into<DeviceVersion>) -> Self {
        Self {
            device_id: device_id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for VersionedDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{ID_SEPARATOR}{}", self.device_id, self.version)
    }
}

// ── Revision ─────────────────────────────────────────────────────────

/// Per-log sequence number stamped on every append or update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    pub const ZERO: Self = Self(0);

    pub fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_change_id_joins_components() {
        let id = DeviceChangeId::compose(
            &NetworkChangeId::from("change-1"),
            &DeviceId::from("device-1"),
            &DeviceVersion::from("1.0.0"),
        );
        assert_eq!(id.as_str(), "change-1:device-1:1.0.0");
    }

    #[test]
    fn versioned_device_id_display() {
        let key = VersionedDeviceId::new("device-1", "1.0.0");
        assert_eq!(key.to_string(), "device-1:1.0.0");
    }

    #[test]
    fn ids_parse_from_str() {
        let id: DeviceId = "switch-7".parse().unwrap();
        assert_eq!(id.to_string(), "switch-7");
    }

    #[test]
    fn revision_is_monotonic() {
        let r = Revision::ZERO.next().next();
        assert_eq!(r.get(), 2);
        assert!(r > Revision::new(1));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&DeviceId::from("d1")).unwrap();
        assert_eq!(json, "\"d1\"");
    }
}
