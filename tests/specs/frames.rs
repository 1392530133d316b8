// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live-frame scenarios: WebSocket delivery, the FPS cap, and slow
//! subscriber isolation.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use of_core::StreamId;

use crate::support::SpecCtx;

async fn collect_frames(
    addr: std::net::SocketAddr,
    stream_id: String,
    window: Duration,
) -> Vec<serde_json::Value> {
    let url = format!("ws://{addr}/ws/frames?stream_id={stream_id}");
    let (mut socket, _) = connect_async(&url).await.unwrap();

    let mut frames = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, socket.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                frames.push(serde_json::from_str(text.as_str()).unwrap());
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_))) | Ok(None) => break,
            Err(_) => break,
        }
    }
    frames
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn websocket_subscriber_receives_frames_for_its_stream() {
    let ctx = SpecCtx::new().await;
    let addr = ctx.serve().await;

    let (_, created) = ctx
        .http(
            "POST",
            "/streams",
            Some(json!({"source_url": "rtsp://cam/1", "is_active": true})),
        )
        .await;
    let id = created["id"].as_str().unwrap().to_string();
    let stream_id: StreamId = id.parse().unwrap();
    let other = StreamId::new();

    let collector = tokio::spawn(collect_frames(addr, id.clone(), Duration::from_millis(800)));
    // publish interleaved frames for two streams
    for ts in 0..10 {
        ctx.publish_frame(&stream_id, ts as f64);
        ctx.publish_frame(&other, ts as f64);
        tokio::time::sleep(Duration::from_millis(40)).await;
    }
    let frames = collector.await.unwrap();

    assert!(!frames.is_empty(), "at least one frame delivered");
    for frame in &frames {
        assert_eq!(frame["type"], "frame");
        assert_eq!(frame["stream_id"], id.as_str());
        assert_eq!(frame["w"], 640);
        assert!(frame["frame_b64"].as_str().unwrap().len() > 4);
        assert!(frame["direction_coherence"].as_f64().unwrap() <= 1.0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fps_cap_bounds_forwarded_frames() {
    let ctx = SpecCtx::new().await;
    let addr = ctx.serve().await;

    // cap the preview rate at 2 fps
    let (status, _) = ctx
        .http(
            "PUT",
            "/settings/system",
            Some(json!({
                "live_preview_fps": 2.0,
                "live_preview_jpeg_quality": 70,
                "live_preview_max_width": 960,
                "orientation_offset_deg": 0.0
            })),
        )
        .await;
    assert_eq!(status, 200);

    let (_, created) = ctx
        .http(
            "POST",
            "/streams",
            Some(json!({"source_url": "rtsp://cam/1", "is_active": true})),
        )
        .await;
    let id = created["id"].as_str().unwrap().to_string();
    let stream_id: StreamId = id.parse().unwrap();

    let window = Duration::from_millis(2000);
    let collector = tokio::spawn(collect_frames(addr, id.clone(), window));

    // ~20 fps input for the whole window
    let publish_until = tokio::time::Instant::now() + window;
    let mut ts = 0.0;
    while tokio::time::Instant::now() < publish_until {
        ctx.publish_frame(&stream_id, ts);
        ts += 1.0;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let frames = collector.await.unwrap();
    // 2 fps over 2 s: allow the boundary frame on either side
    assert!(
        (1..=6).contains(&frames.len()),
        "expected ~4 frames at 2 fps over 2s, got {}",
        frames.len()
    );
}

#[tokio::test]
async fn stalled_subscriber_drops_while_others_flow() {
    let ctx = SpecCtx::new().await;
    let (_, created) = ctx
        .http(
            "POST",
            "/streams",
            Some(json!({"source_url": "rtsp://cam/1", "is_active": true})),
        )
        .await;
    let stream_id: StreamId = created["id"].as_str().unwrap().parse().unwrap();

    let mut fast = ctx.state.hub.subscribe(Some(stream_id));
    let slow = ctx.state.hub.subscribe(Some(stream_id));

    // raise the cap so every published frame is forwarded
    ctx.http(
        "PUT",
        "/settings/system",
        Some(json!({
            "live_preview_fps": 30.0,
            "live_preview_jpeg_quality": 70,
            "live_preview_max_width": 960,
            "orientation_offset_deg": 0.0
        })),
    )
    .await;

    let mut seen = 0;
    for ts in 0..100 {
        ctx.publish_frame(&stream_id, ts as f64);
        // the broker needs the frame to clear its 1/30s window
        tokio::time::sleep(Duration::from_millis(36)).await;
        while fast.recv_now().is_some() {
            seen += 1;
        }
    }

    assert!(seen >= 95, "fast subscriber kept line rate, got {seen}");
    // the stalled subscriber absorbed drops until the overrun policy
    // closed it; the broker never blocked on it
    assert!(
        slow.drop_count() >= 60,
        "slow subscriber absorbed drops, got {}",
        slow.drop_count()
    );
    assert!(slow.was_overrun(), "drop-only subscriber was policy-closed");
}
