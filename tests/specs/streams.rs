// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream lifecycle scenarios: activation, convergence, config-change
//! restarts, deletion.

use serde_json::json;

use of_core::{StreamId, WorkerHandle};

use crate::support::SpecCtx;

#[tokio::test]
async fn activate_converges_to_connected_once_frames_flow() {
    let ctx = SpecCtx::new().await;

    let (status, created) = ctx
        .http(
            "POST",
            "/streams",
            Some(json!({"source_url": "rtsp://cam/river", "is_active": true})),
        )
        .await;
    assert_eq!(status, 201);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["connection_status"], "starting");
    assert!(created["worker_handle"].as_str().is_some());

    // simulated worker begins publishing frames
    let stream_id: StreamId = id.parse().unwrap();
    let publisher = ctx.spawn_publisher(stream_id, std::time::Duration::from_millis(25));

    let view = ctx
        .wait_for_stream(&id, "connected status", |v| {
            v["connection_status"] == "connected"
        })
        .await;
    assert!(view["last_error"].is_null());
    publisher.abort();
}

#[tokio::test]
async fn active_streams_always_hold_a_worker_after_settling() {
    let ctx = SpecCtx::new().await;
    let (_, created) = ctx
        .http(
            "POST",
            "/streams",
            Some(json!({"source_url": "rtsp://cam/1", "is_active": true})),
        )
        .await;
    let id = created["id"].as_str().unwrap().to_string();

    // kill the worker out from under the reconciler; it converges back
    let handle = WorkerHandle::new(format!("worker-{id}"));
    ctx.runtime.vanish(&handle);

    ctx.wait_for_stream(&id, "worker re-attached", |v| {
        v["worker_handle"].as_str().is_some() && v["connection_status"] == "starting"
    })
    .await;
    assert!(ctx.runtime.live_handles().contains(&handle.to_string()));
}

#[tokio::test]
async fn config_change_restarts_with_the_new_fingerprint() {
    let ctx = SpecCtx::new().await;
    let (_, created) = ctx
        .http(
            "POST",
            "/streams",
            Some(json!({"source_url": "rtsp://cam/1", "is_active": true, "grid_size": 16})),
        )
        .await;
    let id = created["id"].as_str().unwrap().to_string();
    let handle = WorkerHandle::new(format!("worker-{id}"));
    let before = ctx.runtime.worker(&handle).unwrap();

    let (status, _) = ctx
        .http(
            "PUT",
            &format!("/streams/{id}"),
            Some(json!({"source_url": "rtsp://cam/1", "is_active": true, "grid_size": 32})),
        )
        .await;
    assert_eq!(status, 200);

    // stop-then-start with fresh parameters
    assert!(ctx.runtime.stops().contains(&handle.to_string()));
    let after = ctx.runtime.worker(&handle).unwrap();
    assert!(after.generation > before.generation, "a new worker instance");
    assert_ne!(after.env["OF_CONFIG_FINGERPRINT"], before.env["OF_CONFIG_FINGERPRINT"]);
    assert_eq!(after.env["OF_GRID_SIZE"], "32");

    // the persisted fingerprint matches what the worker observed
    let (_, view) = ctx.http("GET", &format!("/streams/{id}"), None).await;
    assert_eq!(view["grid_size"], 32);
}

#[tokio::test]
async fn out_of_range_writes_never_touch_the_store() {
    let ctx = SpecCtx::new().await;
    let (_, created) = ctx
        .http("POST", "/streams", Some(json!({"source_url": "rtsp://cam/1"})))
        .await;
    let id = created["id"].as_str().unwrap().to_string();

    for (field, body) in [
        ("latitude", json!({"source_url": "rtsp://cam/1", "latitude": 91.0})),
        ("grid_size", json!({"source_url": "rtsp://cam/1", "grid_size": 2})),
        ("tilt_deg", json!({"source_url": "rtsp://cam/1", "tilt_deg": 89.5})),
        (
            "view_distance_m",
            json!({"source_url": "rtsp://cam/1", "view_distance_m": 10.0}),
        ),
    ] {
        let (status, error) = ctx
            .http("PUT", &format!("/streams/{id}"), Some(body))
            .await;
        assert_eq!(status, 400, "field {field}");
        assert!(error["detail"].as_str().unwrap().contains(field));
    }

    let (_, view) = ctx.http("GET", &format!("/streams/{id}"), None).await;
    assert_eq!(view["grid_size"], 16, "store unchanged after rejections");
    assert!(view["latitude"].is_null());
}

#[tokio::test]
async fn deletion_blocked_while_active_succeeds_after_deactivate() {
    let ctx = SpecCtx::new().await;
    let (_, created) = ctx
        .http(
            "POST",
            "/streams",
            Some(json!({"source_url": "rtsp://cam/1", "is_active": true})),
        )
        .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = ctx.http("DELETE", &format!("/streams/{id}"), None).await;
    assert_eq!(status, 409);

    let (status, _) = ctx
        .http("POST", &format!("/streams/{id}/deactivate"), None)
        .await;
    assert_eq!(status, 200);

    let (status, _) = ctx.http("DELETE", &format!("/streams/{id}"), None).await;
    assert_eq!(status, 204);

    // no surviving worker for that identity
    assert!(ctx.runtime.live_handles().is_empty());
    let (status, _) = ctx.http("GET", &format!("/streams/{id}"), None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn deactivated_streams_settle_with_no_worker() {
    let ctx = SpecCtx::new().await;
    let (_, created) = ctx
        .http(
            "POST",
            "/streams",
            Some(json!({"source_url": "rtsp://cam/1", "is_active": true})),
        )
        .await;
    let id = created["id"].as_str().unwrap().to_string();

    ctx.http("POST", &format!("/streams/{id}/deactivate"), None).await;

    let view = ctx
        .wait_for_stream(&id, "inactive with no handle", |v| {
            v["connection_status"] == "inactive" && v["worker_handle"].is_null()
        })
        .await;
    assert_eq!(view["is_active"], false);
    assert!(ctx.runtime.live_handles().is_empty());
}
