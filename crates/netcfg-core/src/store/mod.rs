// ── Versioned change stores ──
//
// Append-ordered logs with point-in-time listing and live watches.

mod device;
mod log;
mod network;

pub use device::DeviceChangeStore;
pub use log::{ChangeEvent, ChangeEventKind, ChangeLog, LogTxn};
pub use network::NetworkChangeStore;
