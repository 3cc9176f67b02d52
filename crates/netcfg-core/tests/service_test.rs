#![allow(clippy::unwrap_used)]
// Integration tests for the streaming `Service` surface.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use netcfg_core::{
    CoreError, DeviceChangeRequest, EventType, ListDeviceChangesRequest,
    ListDeviceChangesResponse, ListNetworkChangesRequest, ListNetworkChangesResponse, Manager,
    OpStateRequest, OpStateResponse, PathValue, Phase, ResponseSink, RollbackRequest, Service,
    SinkError, StateEvent, StoreConfig, SubmitRequest, TypedValue,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> Service {
    let manager = Manager::new(StoreConfig::default());
    manager.start().await.unwrap();
    Service::new(manager)
}

async fn submit(service: &Service, name: &str, devices: &[&str]) {
    service
        .manager()
        .submit(SubmitRequest {
            name: Some(name.to_owned()),
            changes: devices
                .iter()
                .map(|d| {
                    DeviceChangeRequest::new(
                        *d,
                        "1.0.0",
                        vec![PathValue::new("/system/hostname", TypedValue::string(*d))],
                    )
                })
                .collect(),
        })
        .await
        .unwrap();
}

/// Sink that fails after accepting `remaining` items.
struct FailingSink {
    remaining: usize,
}

impl<T: Send> ResponseSink<T> for FailingSink {
    async fn send(&mut self, _item: T) -> Result<(), SinkError> {
        if self.remaining == 0 {
            return Err(SinkError::Failed("connection reset".into()));
        }
        self.remaining -= 1;
        Ok(())
    }
}

// ── ListNetworkChanges ──────────────────────────────────────────────

#[tokio::test]
async fn test_list_network_changes_snapshot() {
    let service = setup().await;
    submit(&service, "cfg-1", &["d1"]).await;
    submit(&service, "cfg-2", &["d2"]).await;
    submit(&service, "other", &["d3"]).await;

    let mut sink = Vec::new();
    service
        .list_network_changes(
            ListNetworkChangesRequest {
                change_id: "cfg-*".into(),
                ..Default::default()
            },
            &mut sink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let names: Vec<&str> = sink.iter().map(|r| r.change.id.as_str()).collect();
    assert_eq!(names, ["cfg-1", "cfg-2"]);
}

#[tokio::test]
async fn test_list_network_changes_subscribe_streams_until_cancelled() {
    let service = setup().await;
    submit(&service, "c1", &["d1"]).await;

    let (tx, mut rx) = mpsc::channel::<ListNetworkChangesResponse>(16);
    let cancel = CancellationToken::new();
    let task = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            service
                .list_network_changes(
                    ListNetworkChangesRequest {
                        subscribe: true,
                        ..Default::default()
                    },
                    &mut tx,
                    cancel,
                )
                .await
        })
    };

    assert_eq!(rx.recv().await.unwrap().change.id.as_str(), "c1");

    submit(&service, "c2", &["d2"]).await;
    assert_eq!(rx.recv().await.unwrap().change.id.as_str(), "c2");

    service
        .manager()
        .set_phase(&"c2".into(), Phase::Applying)
        .await
        .unwrap();
    assert_eq!(rx.recv().await.unwrap().change.phase, Phase::Applying);

    cancel.cancel();
    timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(service.manager().network_changes().watchers().is_empty());
}

#[tokio::test]
async fn test_cancel_ends_stream_blocked_on_full_sink() {
    let service = setup().await;
    submit(&service, "c1", &["d1"]).await;
    submit(&service, "c2", &["d1"]).await;
    submit(&service, "c3", &["d1"]).await;

    // The receiver stays alive but is never read, so the replay parks on
    // the second send.
    let (tx, _rx) = mpsc::channel::<ListNetworkChangesResponse>(1);
    let cancel = CancellationToken::new();
    let task = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            service
                .list_network_changes(
                    ListNetworkChangesRequest {
                        subscribe: true,
                        ..Default::default()
                    },
                    &mut tx,
                    cancel,
                )
                .await
        })
    };

    while service.manager().network_changes().watchers().is_empty() {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    cancel.cancel();
    timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(service.manager().network_changes().watchers().is_empty());
}

#[tokio::test]
async fn test_cancel_ends_device_snapshot_blocked_on_full_sink() {
    let service = setup().await;
    submit(&service, "c1", &["d1"]).await;
    submit(&service, "c2", &["d1"]).await;
    submit(&service, "c3", &["d1"]).await;

    let (tx, _rx) = mpsc::channel::<ListDeviceChangesResponse>(1);
    let cancel = CancellationToken::new();
    let task = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            service
                .list_device_changes(
                    ListDeviceChangesRequest {
                        device_id: "d1".into(),
                        device_version: "1.0.0".into(),
                        ..Default::default()
                    },
                    &mut tx,
                    cancel,
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_list_network_changes_without_replay() {
    let service = setup().await;
    submit(&service, "old", &["d1"]).await;

    let (tx, mut rx) = mpsc::channel::<ListNetworkChangesResponse>(16);
    let cancel = CancellationToken::new();
    let task = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            service
                .list_network_changes(
                    ListNetworkChangesRequest {
                        subscribe: true,
                        without_replay: true,
                        ..Default::default()
                    },
                    &mut tx,
                    cancel,
                )
                .await
        })
    };

    // Wait for the watch to be registered before submitting.
    while service.manager().network_changes().watchers().is_empty() {
        tokio::task::yield_now().await;
    }
    submit(&service, "new", &["d1"]).await;
    assert_eq!(rx.recv().await.unwrap().change.id.as_str(), "new");

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_sink_failure_closes_the_watch() {
    let service = setup().await;
    submit(&service, "c1", &["d1"]).await;
    submit(&service, "c2", &["d1"]).await;

    let err = service
        .list_network_changes(
            ListNetworkChangesRequest {
                subscribe: true,
                ..Default::default()
            },
            &mut FailingSink { remaining: 1 },
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::StreamSend { .. }));
    assert!(service.manager().network_changes().watchers().is_empty());
}

// ── ListDeviceChanges ───────────────────────────────────────────────

#[tokio::test]
async fn test_list_device_changes_snapshot() {
    let service = setup().await;
    submit(&service, "c1", &["d1", "d2"]).await;
    submit(&service, "c2", &["d2"]).await;

    let mut sink = Vec::new();
    service
        .list_device_changes(
            ListDeviceChangesRequest {
                device_id: "d2".into(),
                device_version: "1.0.0".into(),
                ..Default::default()
            },
            &mut sink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = sink.iter().map(|r| r.change.id.as_str()).collect();
    assert_eq!(ids, ["c1:d2:1.0.0", "c2:d2:1.0.0"]);
}

#[tokio::test]
async fn test_list_device_changes_requires_device() {
    let service = setup().await;
    let err = service
        .list_device_changes(
            ListDeviceChangesRequest::default(),
            &mut Vec::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
}

// ── RollbackNetworkChange ───────────────────────────────────────────

#[tokio::test]
async fn test_rollback_reports_message() {
    let service = setup().await;
    submit(&service, "c1", &["d1"]).await;
    let id = "c1".into();
    service.manager().set_phase(&id, Phase::Applying).await.unwrap();
    service.manager().set_phase(&id, Phase::Applied).await.unwrap();

    let response = service
        .rollback_network_change(RollbackRequest { name: "c1".into() })
        .await
        .unwrap();
    insta::assert_snapshot!(response.message, @"Rolled back change 'c1'");

    let err = service
        .rollback_network_change(RollbackRequest { name: "c1".into() })
        .await
        .unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"Rollback aborted. Network change c1 is ROLLED_BACK, only APPLIED changes can be rolled back");
}

// ── GetOpState ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_op_state_snapshot_then_live_for_one_device() {
    let service = setup().await;
    let manager = service.manager().clone();
    manager
        .apply_state(StateEvent::added("d1", "/cpu", TypedValue::uint(10)))
        .await
        .unwrap();
    // The ingest task applies asynchronously.
    while manager.state_cache().get(&"d1".into()).is_err() {
        tokio::task::yield_now().await;
    }

    let (tx, mut rx) = mpsc::channel::<OpStateResponse>(16);
    let cancel = CancellationToken::new();
    let task = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            service
                .get_operational_state(
                    OpStateRequest {
                        device_id: "d1".into(),
                        subscribe: true,
                    },
                    &mut tx,
                    cancel,
                )
                .await
        })
    };

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind, EventType::None);
    assert_eq!(first.path_value.path, "/cpu");

    while manager.dispatcher().listeners().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(manager.dispatcher().listeners()[0].starts_with("diags-"));

    manager
        .apply_state(StateEvent::added("d2", "/cpu", TypedValue::uint(99)))
        .await
        .unwrap();
    manager
        .apply_state(StateEvent::changed("d1", "/cpu", TypedValue::uint(20)))
        .await
        .unwrap();

    let live = rx.recv().await.unwrap();
    assert_eq!(live.kind, EventType::Changed);
    assert_eq!(live.path_value.value, TypedValue::uint(20));

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert!(manager.dispatcher().listeners().is_empty());
}

#[tokio::test]
async fn test_op_state_unknown_device() {
    let service = setup().await;
    let err = service
        .get_operational_state(
            OpStateRequest {
                device_id: "ghost".into(),
                subscribe: false,
            },
            &mut Vec::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"no Operational State cache available for ghost");
}

#[tokio::test]
async fn test_shutdown_ends_subscriptions() {
    let service = setup().await;
    let (tx, _rx) = mpsc::channel::<ListNetworkChangesResponse>(16);
    let task = {
        let service = service.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            service
                .list_network_changes(
                    ListNetworkChangesRequest {
                        subscribe: true,
                        ..Default::default()
                    },
                    &mut tx,
                    CancellationToken::new(),
                )
                .await
        })
    };
    while service.manager().network_changes().watchers().is_empty() {
        tokio::task::yield_now().await;
    }

    service.manager().shutdown().await;
    timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
