// ── Runtime store configuration ──
//
// Tuning knobs for the `Manager`. Built by the embedding process
// (usually from `netcfg-config`); core never reads config files.

use std::time::Duration;

/// Configuration for a single [`Manager`](crate::Manager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Capacity of the bounded operational-state ingestion channel.
    pub state_channel_size: usize,
    /// How long `shutdown()` waits for background tasks before abandoning them.
    pub shutdown_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_channel_size: 1024,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}
