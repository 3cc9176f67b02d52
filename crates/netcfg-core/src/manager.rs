// ── Manager ──
//
// Explicit context handle for one configuration-state core: both change
// stores, the operational-state cache and dispatcher, the model registry
// and the background state-ingestion task.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use netcfg_api::Update;

use crate::codec;
use crate::config::StoreConfig;
use crate::error::CoreError;
use crate::model::{
    DeviceChange, DeviceChangeRef, DeviceId, ID_SEPARATOR, NetworkChange, NetworkChangeId,
    PathValue, Phase, StateEvent, VersionedDeviceId,
};
use crate::registry::{ModelRegistry, NoHints};
use crate::service::requests::SubmitRequest;
use crate::state::{Dispatcher, OperationalStateCache};
use crate::store::{DeviceChangeStore, NetworkChangeStore};

// ── Manager ──────────────────────────────────────────────────────────

/// The main entry point for embedders.
///
/// Cheaply cloneable via `Arc<ManagerInner>`. Call [`start()`](Self::start)
/// to begin consuming operational-state updates and
/// [`shutdown()`](Self::shutdown) to end every open stream.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: StoreConfig,
    network_changes: NetworkChangeStore,
    device_changes: DeviceChangeStore,
    state_cache: Arc<OperationalStateCache>,
    dispatcher: Arc<Dispatcher>,
    /// Swappable while running; `ArcSwap` needs a sized payload, hence the box.
    registry: ArcSwap<Box<dyn ModelRegistry>>,
    state_tx: mpsc::Sender<StateEvent>,
    state_rx: Mutex<Option<mpsc::Receiver<StateEvent>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes submits so the name check holds until the commit.
    submit_lock: Mutex<()>,
}

impl Manager {
    /// Create a manager without type hints. Does NOT start background tasks.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_registry(config, NoHints)
    }

    pub fn with_registry(config: StoreConfig, registry: impl ModelRegistry + 'static) -> Self {
        let (state_tx, state_rx) = mpsc::channel(config.state_channel_size.max(1));
        let registry: Box<dyn ModelRegistry> = Box::new(registry);

        Self {
            inner: Arc::new(ManagerInner {
                config,
                network_changes: NetworkChangeStore::new(),
                device_changes: DeviceChangeStore::new(),
                state_cache: Arc::new(OperationalStateCache::new()),
                dispatcher: Arc::new(Dispatcher::new()),
                registry: ArcSwap::from_pointee(registry),
                state_tx,
                state_rx: Mutex::new(Some(state_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                submit_lock: Mutex::new(()),
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn network_changes(&self) -> &NetworkChangeStore {
        &self.inner.network_changes
    }

    pub fn device_changes(&self) -> &DeviceChangeStore {
        &self.inner.device_changes
    }

    pub fn state_cache(&self) -> &OperationalStateCache {
        &self.inner.state_cache
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// The registry currently used by [`decode_update`](Self::decode_update).
    pub fn registry(&self) -> Arc<Box<dyn ModelRegistry>> {
        self.inner.registry.load_full()
    }

    /// Swap in a new registry. In-flight decodes finish with the old one.
    pub fn set_registry(&self, registry: impl ModelRegistry + 'static) {
        let registry: Box<dyn ModelRegistry> = Box::new(registry);
        self.inner.registry.store(Arc::new(registry));
        debug!("model registry replaced");
    }

    /// A fresh token that is cancelled when the manager shuts down.
    pub fn child_token(&self) -> CancellationToken {
        self.inner.cancel.child_token()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the operational-state ingestion task. Requires a tokio runtime.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShuttingDown);
        }
        let Some(rx) = self.inner.state_rx.lock().await.take() else {
            return Err(CoreError::validation("manager already started"));
        };

        let handle = tokio::spawn(state_ingest_task(
            Arc::clone(&self.inner.state_cache),
            Arc::clone(&self.inner.dispatcher),
            rx,
            self.inner.cancel.clone(),
        ));
        self.inner.task_handles.lock().await.push(handle);

        info!(
            state_channel_size = self.inner.config.state_channel_size,
            "manager started"
        );
        Ok(())
    }

    /// Cancel background tasks, wait up to `shutdown_timeout` for them, then
    /// close every store so open watch sessions and listeners terminate.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let deadline = Instant::now() + self.inner.config.shutdown_timeout;
        let handles: Vec<JoinHandle<()>> = self.inner.task_handles.lock().await.drain(..).collect();
        for mut handle in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if timeout(remaining, &mut handle).await.is_err() {
                warn!("background task did not stop in time, aborting");
                handle.abort();
            }
        }

        self.inner.network_changes.close();
        self.inner.device_changes.close();
        self.inner.dispatcher.close();
        info!("manager shut down");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── Operational state ────────────────────────────────────────────

    /// Sender for the state-ingestion channel, for southbound producers.
    pub fn state_updates(&self) -> mpsc::Sender<StateEvent> {
        self.inner.state_tx.clone()
    }

    /// Queue one state event. Waits while the ingestion channel is full.
    pub async fn apply_state(&self, event: StateEvent) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShuttingDown);
        }
        self.inner
            .state_tx
            .send(event)
            .await
            .map_err(|_| CoreError::ShuttingDown)
    }

    /// Mark a device as synchronized with no operational paths yet.
    pub fn initialize_device(&self, device_id: DeviceId) {
        self.inner.state_cache.initialize(device_id);
    }

    // ── Changes ──────────────────────────────────────────────────────

    /// Record a new network change and its per-device changes.
    ///
    /// Device changes are written first and the network change last, so a
    /// listed network change always has every device change it refers to.
    /// On failure the device changes already written are taken back.
    ///
    /// The network change is created first (PENDING), then one device change
    /// per target device.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Arc<NetworkChange>, CoreError> {
        validate_submit(&request)?;

        let name = NetworkChangeId::from(
            request
                .name
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        );
        let device_changes: Vec<DeviceChange> = request
            .changes
            .into_iter()
            .map(|c| DeviceChange::new(name.clone(), c.device_id, c.device_version, c.values))
            .collect();
        let refs = device_changes.iter().map(DeviceChangeRef::from).collect();

        let _submit = self.inner.submit_lock.lock().await;
        if self.inner.network_changes.get(&name).await.is_ok() {
            return Err(CoreError::already_exists("network change", name.as_str()));
        }

        let count = device_changes.len();
        let mut written: Vec<DeviceChange> = Vec::with_capacity(count);
        for change in device_changes {
            let pending = change.clone();
            if let Err(e) = self.inner.device_changes.create(change).await {
                self.discard(&name, &written).await;
                return Err(e);
            }
            written.push(pending);
        }

        let network_change = match self
            .inner
            .network_changes
            .create(NetworkChange::new(name.clone(), refs))
            .await
        {
            Ok(change) => change,
            Err(e) => {
                self.discard(&name, &written).await;
                return Err(e);
            }
        };

        info!(name = %name, devices = count, "network change submitted");
        Ok(network_change)
    }

    async fn discard(&self, name: &NetworkChangeId, written: &[DeviceChange]) {
        for change in written {
            self.inner.device_changes.remove(change).await;
        }
        warn!(name = %name, discarded = written.len(), "network change not recorded");
    }

    pub async fn set_phase(
        &self,
        id: &NetworkChangeId,
        phase: Phase,
    ) -> Result<Arc<NetworkChange>, CoreError> {
        self.inner.network_changes.set_phase(id, phase).await
    }

    pub async fn rollback_network_change(&self, name: &str) -> Result<Arc<NetworkChange>, CoreError> {
        self.inner.network_changes.rollback(name).await
    }

    /// Decode a wire update with the current registry's type hints.
    pub fn decode_update(&self, update: &Update) -> Result<PathValue, CoreError> {
        let registry = self.inner.registry.load();
        Ok(codec::decode_update(update, &***registry)?)
    }
}

// ── Validation ───────────────────────────────────────────────────────

fn check_component(what: &str, value: &str) -> Result<(), CoreError> {
    if value.is_empty() {
        return Err(CoreError::validation(format!("{what} must not be empty")));
    }
    if value.contains(ID_SEPARATOR) {
        return Err(CoreError::validation(format!(
            "{what} {value:?} must not contain '{ID_SEPARATOR}'"
        )));
    }
    Ok(())
}

fn validate_submit(request: &SubmitRequest) -> Result<(), CoreError> {
    if request.changes.is_empty() {
        return Err(CoreError::validation("network change has no device changes"));
    }
    if let Some(name) = &request.name {
        check_component("network change name", name)?;
    }

    let mut seen = HashSet::new();
    for change in &request.changes {
        check_component("device id", change.device_id.as_str())?;
        check_component("device version", change.device_version.as_str())?;
        let key = VersionedDeviceId {
            device_id: change.device_id.clone(),
            version: change.device_version.clone(),
        };
        if !seen.insert(key) {
            return Err(CoreError::validation(format!(
                "device {}:{} appears more than once",
                change.device_id, change.device_version
            )));
        }
    }
    Ok(())
}

// ── Background tasks ─────────────────────────────────────────────────

/// Single consumer of operational-state updates.
///
/// Applies each event to the cache before dispatching it, so a listener
/// that reacts to an event and then reads the cache sees that event.
async fn state_ingest_task(
    cache: Arc<OperationalStateCache>,
    dispatcher: Arc<Dispatcher>,
    mut rx: mpsc::Receiver<StateEvent>,
    cancel: CancellationToken,
) {
    debug!("state_ingest_task started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                debug!(
                    device = %event.device_id,
                    path = %event.path,
                    kind = %event.kind,
                    "state event"
                );
                cache.apply(&event);
                dispatcher.dispatch(&event);
            }
        }
    }
    debug!("state_ingest_task stopped");
}
