// ── Query / mutate service ──
//
// The streaming surface an RPC layer sits on. Each call writes responses
// into a caller-provided sink and returns once the stream is finished:
// after the snapshot when not subscribed, otherwise on cancellation, on
// shutdown, or on the first sink failure.

pub mod requests;

use std::future::Future;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::manager::Manager;
use crate::model::{PathValue, StateEventKind, VersionedDeviceId};
use crate::stream::WatchOptions;

use self::requests::{
    EventType, ListDeviceChangesRequest, ListDeviceChangesResponse, ListNetworkChangesRequest,
    ListNetworkChangesResponse, OpStateRequest, OpStateResponse, RollbackRequest, RollbackResponse,
};

// ── ResponseSink ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("response stream closed")]
    Closed,

    #[error("{0}")]
    Failed(String),
}

/// Destination for streamed responses.
pub trait ResponseSink<T>: Send {
    fn send(&mut self, item: T) -> impl Future<Output = Result<(), SinkError>> + Send;
}

impl<T: Send> ResponseSink<T> for mpsc::Sender<T> {
    async fn send(&mut self, item: T) -> Result<(), SinkError> {
        mpsc::Sender::send(self, item)
            .await
            .map_err(|_| SinkError::Closed)
    }
}

impl<T: Send> ResponseSink<T> for Vec<T> {
    async fn send(&mut self, item: T) -> Result<(), SinkError> {
        self.push(item);
        Ok(())
    }
}

/// Send `item` unless `cancel` fires first; `None` means cancelled.
async fn send_or_cancel<S, T>(
    sink: &mut S,
    item: T,
    cancel: &CancellationToken,
) -> Option<Result<(), SinkError>>
where
    S: ResponseSink<T>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = sink.send(item) => Some(result),
    }
}

fn stream_send(stream: &str, err: &SinkError) -> CoreError {
    warn!(stream, error = %err, "error sending on stream, closing");
    CoreError::StreamSend {
        message: err.to_string(),
    }
}

// ── Service ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Service {
    manager: Manager,
}

impl Service {
    pub fn new(manager: Manager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Stream network changes whose name matches `change_id`.
    ///
    /// With `subscribe`, existing changes are replayed (unless
    /// `without_replay`) and live changes follow until `cancel` fires.
    pub async fn list_network_changes<S>(
        &self,
        request: ListNetworkChangesRequest,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> Result<(), CoreError>
    where
        S: ResponseSink<ListNetworkChangesResponse>,
    {
        info!(
            change_id = %request.change_id,
            subscribe = request.subscribe,
            "ListNetworkChanges called"
        );
        let store = self.manager.network_changes();

        if !request.subscribe {
            for change in store.list(Some(request.change_id.as_str())).await {
                match send_or_cancel(sink, ListNetworkChangesResponse { change }, &cancel).await {
                    None => return Ok(()),
                    Some(result) => result.map_err(|e| stream_send("network changes", &e))?,
                }
            }
            return Ok(());
        }

        let options = WatchOptions::new()
            .with_replay(!request.without_replay)
            .with_filter(request.change_id)
            .with_cancel(cancel.clone());
        let mut session = store.watch(options).await?;
        while let Some(event) = session.next().await {
            debug!(watch = session.id(), change = %event.change.id, "sending matching change");
            let response = ListNetworkChangesResponse {
                change: event.change,
            };
            match send_or_cancel(sink, response, &cancel).await {
                None => {
                    session.close();
                    break;
                }
                Some(Err(e)) => {
                    session.close();
                    return Err(stream_send(session.id(), &e));
                }
                Some(Ok(())) => {}
            }
        }
        debug!(watch = session.id(), "network change stream ended");
        Ok(())
    }

    /// Stream the changes of one device at one version.
    pub async fn list_device_changes<S>(
        &self,
        request: ListDeviceChangesRequest,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> Result<(), CoreError>
    where
        S: ResponseSink<ListDeviceChangesResponse>,
    {
        if request.device_id.is_empty() {
            return Err(CoreError::validation("device id must not be empty"));
        }
        info!(
            device = %request.device_id,
            version = %request.device_version,
            subscribe = request.subscribe,
            "ListDeviceChanges called"
        );
        let key = VersionedDeviceId {
            device_id: request.device_id,
            version: request.device_version,
        };
        let store = self.manager.device_changes();

        if !request.subscribe {
            for change in store.list(&key).await {
                match send_or_cancel(sink, ListDeviceChangesResponse { change }, &cancel).await {
                    None => return Ok(()),
                    Some(result) => result.map_err(|e| stream_send("device changes", &e))?,
                }
            }
            return Ok(());
        }

        let options = WatchOptions::new()
            .with_replay(!request.without_replay)
            .with_cancel(cancel.clone());
        let mut session = store.watch(&key, options).await?;
        while let Some(event) = session.next().await {
            let response = ListDeviceChangesResponse {
                change: event.change,
            };
            match send_or_cancel(sink, response, &cancel).await {
                None => {
                    session.close();
                    break;
                }
                Some(Err(e)) => {
                    session.close();
                    return Err(stream_send(session.id(), &e));
                }
                Some(Ok(())) => {}
            }
        }
        debug!(watch = session.id(), device = %key, "device change stream ended");
        Ok(())
    }

    /// Roll back the named network change.
    pub async fn rollback_network_change(
        &self,
        request: RollbackRequest,
    ) -> Result<RollbackResponse, CoreError> {
        self.manager.rollback_network_change(&request.name).await?;
        Ok(RollbackResponse {
            message: format!("Rolled back change '{}'", request.name),
        })
    }

    /// Stream the operational state of one device.
    ///
    /// Cached paths are sent first with [`EventType::None`]. With
    /// `subscribe`, live events for the device follow with their own kind.
    pub async fn get_operational_state<S>(
        &self,
        request: OpStateRequest,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> Result<(), CoreError>
    where
        S: ResponseSink<OpStateResponse>,
    {
        let snapshot = self.manager.state_cache().get(&request.device_id)?;
        for (path, value) in snapshot {
            let response = OpStateResponse {
                kind: EventType::None,
                path_value: PathValue::new(path, value),
            };
            match send_or_cancel(sink, response, &cancel).await {
                None => return Ok(()),
                Some(result) => result.map_err(|e| stream_send("operational state", &e))?,
            }
        }

        if !request.subscribe {
            info!(device = %request.device_id, "closing operational state stream (no subscribe)");
            return Ok(());
        }

        let stream_id = format!("diags-{}", Uuid::new_v4());
        let mut listener = match self.manager.dispatcher().register_listener(stream_id.as_str()) {
            Ok(listener) => listener.with_cancel(cancel.clone()),
            Err(e) => {
                warn!(device = %request.device_id, error = %e, "failed setting up operational state listener");
                return Err(e);
            }
        };
        info!(stream = %stream_id, device = %request.device_id, "operational state subscription started");

        while let Some(event) = listener.next().await {
            if event.device_id != request.device_id {
                continue;
            }
            let response = OpStateResponse {
                kind: event.kind.into(),
                path_value: if event.kind == StateEventKind::Removed {
                    PathValue::removal(event.path)
                } else {
                    PathValue::new(event.path, event.value)
                },
            };
            match send_or_cancel(sink, response, &cancel).await {
                None => {
                    listener.close();
                    break;
                }
                Some(Err(e)) => {
                    listener.close();
                    return Err(stream_send(&stream_id, &e));
                }
                Some(Ok(())) => {}
            }
        }

        info!(stream = %stream_id, device = %request.device_id, "operational state subscription closed");
        Ok(())
    }
}
