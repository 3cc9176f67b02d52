//! In-memory configuration-state core for a network configuration service.
//!
//! This crate owns the change stores, the value codec and the streaming
//! query surface that an RPC layer exposes:
//!
//! - **[`Manager`]**: explicit context handle. Owns the
//!   [`NetworkChangeStore`], the per-device [`DeviceChangeStore`], the
//!   [`OperationalStateCache`] and its [`Dispatcher`], and the swappable
//!   [`ModelRegistry`]. [`start()`](Manager::start) spawns the state
//!   ingestion task and [`shutdown()`](Manager::shutdown) ends every open
//!   stream.
//!
//! - **[`ChangeLog<T>`]**: append-only, revisioned record log with
//!   transactional updates. Each log hands out [`WatchSession`]s that replay
//!   a consistent snapshot and then follow live events with no gap and no
//!   duplicate.
//!
//! - **[`Service`]**: `ListNetworkChanges`, `ListDeviceChanges`,
//!   `RollbackNetworkChange` and `GetOpState`, each writing into a
//!   [`ResponseSink`].
//!
//! - **[`codec`]**: conversion between the in-memory [`TypedValue`], the
//!   flat [`RawValue`] byte form and the `netcfg-api` wire value.

pub mod codec;
pub mod config;
pub mod error;
pub(crate) mod hub;
pub mod manager;
pub mod model;
pub mod registry;
pub mod service;
pub mod state;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::StoreConfig;
pub use error::{CoreError, DecodeError, EncodeError, RollbackRejection};
pub use manager::Manager;
pub use registry::{ModelRegistry, NoHints, StaticRegistry, TypeHint};
pub use service::requests::*;
pub use service::{ResponseSink, Service, SinkError};
pub use state::{Dispatcher, OperationalStateCache, StateListener};
pub use store::{
    ChangeEvent, ChangeEventKind, ChangeLog, DeviceChangeStore, LogTxn, NetworkChangeStore,
};
pub use stream::{WatchOptions, WatchSession, WildcardMatcher};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ChangeRecord, Decimal, DeviceChange, DeviceChangeId, DeviceChangeRef, DeviceId, DeviceVersion,
    LeafList, NetworkChange, NetworkChangeId, PathValue, Phase, RawValue, Revision, SnapshotId,
    StateEvent, StateEventKind, TypedValue, ValueType, VersionedDeviceId, Width,
};
