// ── Operational state ──
//
// Cache of the last reported value per device path, and the dispatcher that
// pushes state events to live listeners. Reading the cache and registering
// a listener are separate steps, and ingestion updates the cache before it
// dispatches. An event landing between the two steps may be missed or
// delivered twice, once in the snapshot and once live.

mod cache;
mod dispatcher;

pub use cache::OperationalStateCache;
pub use dispatcher::{Dispatcher, StateListener};
