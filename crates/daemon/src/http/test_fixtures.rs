// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for API handler tests: a daemon assembled against
//! fakes, plus a oneshot request helper.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use of_adapters::{FakeFrameBus, FakeRuntime, InfraEndpoints};
use of_engine::{BrokerConfig, ReconcilerConfig};
use of_storage::Store;

use crate::lifecycle::{build_state, Deps};

use super::AppState;

pub(crate) struct TestCtx {
    pub state: AppState,
    pub runtime: FakeRuntime,
    pub bus: FakeFrameBus,
    shutdown: CancellationToken,
}

impl Drop for TestCtx {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// A full daemon wired against fakes. The reconciler's periodic sweep
/// is effectively disabled so tests drive transitions through the API.
pub(crate) async fn test_ctx() -> TestCtx {
    let store = Store::open_in_memory().await.unwrap();
    let runtime = FakeRuntime::new();
    let bus = FakeFrameBus::new();
    let shutdown = CancellationToken::new();

    let state = build_state(
        Deps {
            store,
            runtime: Arc::new(runtime.clone()),
            bus: Arc::new(bus.clone()),
            infra: InfraEndpoints {
                redis_url: "redis://bus:6379".to_string(),
                database_url: "sqlite::memory:".to_string(),
                metrics_url: None,
            },
            worker_image: "of-worker:test".to_string(),
            reconciler: ReconcilerConfig {
                interval: Duration::from_secs(3600),
                start_deadline: Duration::from_secs(2),
                stop_deadline: Duration::from_secs(2),
                inspect_deadline: Duration::from_secs(2),
                ..Default::default()
            },
            broker: BrokerConfig::default(),
        },
        shutdown.clone(),
    )
    .await
    .unwrap();

    TestCtx { state, runtime, bus, shutdown }
}

/// Drive one request through a fresh router.
pub(crate) async fn send(
    state: &AppState,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    };

    let response = super::router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Like `send`, but keeps the body as raw text (for /metrics).
pub(crate) async fn send_raw(state: &AppState, method: &str, path: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    let response = super::router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}
