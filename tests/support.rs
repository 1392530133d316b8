// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spec-test harness: a daemon on fakes with fast reconcile timing,
//! driven either in-process (tower oneshot) or over a real socket for
//! WebSocket scenarios.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use of_adapters::{FakeFrameBus, FakeRuntime, InfraEndpoints};
use of_core::{frame_channel, FrameMessage, StreamId};
use of_daemon::{build_state, router, AppState, Deps};
use of_engine::{BrokerConfig, ReconcilerConfig};
use of_storage::Store;

/// Sweep interval used by every spec test.
pub const SWEEP: Duration = Duration::from_millis(50);
/// Bounded settling time: two sweeps plus margin.
pub const SETTLE: Duration = Duration::from_secs(2);

pub struct SpecCtx {
    pub state: AppState,
    pub runtime: FakeRuntime,
    pub bus: FakeFrameBus,
    shutdown: CancellationToken,
}

impl Drop for SpecCtx {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl SpecCtx {
    pub async fn new() -> Self {
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
                worker_image: "of-worker:spec".to_string(),
                reconciler: ReconcilerConfig {
                    interval: SWEEP,
                    start_deadline: Duration::from_secs(2),
                    stop_deadline: Duration::from_secs(2),
                    inspect_deadline: Duration::from_secs(2),
                    stale_after: Duration::from_millis(150),
                    start_grace: Duration::from_millis(400),
                    max_restarts_per_minute: 3,
                    log_tail_lines: 10,
                },
                broker: BrokerConfig {
                    backoff_initial: Duration::from_millis(10),
                    backoff_cap: Duration::from_millis(100),
                },
            },
            shutdown.clone(),
        )
        .await
        .unwrap();

        // let the broker open its subscription before tests publish
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self { state, runtime, bus, shutdown }
    }

    /// One in-process request. Status is returned as a bare u16.
    pub async fn http(&self, method: &str, path: &str, body: Option<Value>) -> (u16, Value) {
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
        let response = router(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Serve the API on an ephemeral port for WebSocket scenarios.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(self.state.clone());
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .unwrap();
        });
        addr
    }

    /// Publish a worker frame onto the fake bus.
    pub fn publish_frame(&self, id: &StreamId, ts: f64) {
        let frame = FrameMessage {
            kind: "frame".to_string(),
            stream_id: *id,
            ts,
            w: 640,
            h: 360,
            fps: 20.0,
            vector_count: 64,
            avg_magnitude: 1.2,
            max_magnitude: 4.8,
            direction_degrees: 183.0,
            direction_coherence: 0.77,
            frame_b64: "/9j/4AAQSkZJRg==".to_string(),
            vectors: None,
        };
        self.bus
            .publish(&frame_channel(id), frame.to_json().unwrap().into_bytes());
    }

    /// Keep publishing frames for one stream until the handle is
    /// aborted, like a healthy worker would.
    pub fn spawn_publisher(&self, id: StreamId, period: Duration) -> tokio::task::JoinHandle<()> {
        let bus = self.bus.clone();
        tokio::spawn(async move {
            let mut ts = 0.0_f64;
            loop {
                let frame = FrameMessage {
                    kind: "frame".to_string(),
                    stream_id: id,
                    ts,
                    w: 640,
                    h: 360,
                    fps: 20.0,
                    vector_count: 64,
                    avg_magnitude: 1.2,
                    max_magnitude: 4.8,
                    direction_degrees: 183.0,
                    direction_coherence: 0.77,
                    frame_b64: "/9j/4AAQSkZJRg==".to_string(),
                    vectors: None,
                };
                if let Ok(json) = frame.to_json() {
                    bus.publish(&frame_channel(&id), json.into_bytes());
                }
                ts += 1.0;
                tokio::time::sleep(period).await;
            }
        })
    }

    /// Poll a stream's view until `check` passes or `SETTLE` elapses.
    pub async fn wait_for_stream<F>(&self, id: &str, what: &str, check: F) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        let deadline = tokio::time::Instant::now() + SETTLE;
        loop {
            let (status, body) = self.http("GET", &format!("/streams/{id}"), None).await;
            if status == 200 && check(&body) {
                return body;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {what}; last view: {body}");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
