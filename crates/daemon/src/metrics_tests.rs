// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::Ordering;
use std::sync::Arc;

use of_engine::{EngineMetrics, SubscriptionHub};

use super::*;

#[test]
fn render_emits_every_counter_with_current_values() {
    let engine = Arc::new(EngineMetrics::default());
    engine.frames_received.store(42, Ordering::Relaxed);
    engine.worker_restarts.store(3, Ordering::Relaxed);
    let hub = Arc::new(SubscriptionHub::new(Arc::clone(&engine)));
    let _sub = hub.subscribe(None);

    let metrics = AppMetrics::new(engine, hub);
    metrics.http_requests.store(7, Ordering::Relaxed);
    let text = metrics.render().unwrap();

    assert!(text.contains("of_frames_received_total 42"));
    assert!(text.contains("of_worker_restarts_total 3"));
    assert!(text.contains("of_http_requests_total 7"));
    assert!(text.contains("of_ws_subscribers 1"));
    assert!(text.contains("# HELP of_frames_received_total"));
}

#[test]
fn render_is_a_snapshot_not_a_reset() {
    let engine = Arc::new(EngineMetrics::default());
    engine.frames_received.store(5, Ordering::Relaxed);
    let hub = Arc::new(SubscriptionHub::new(Arc::clone(&engine)));
    let metrics = AppMetrics::new(engine, hub);

    assert!(metrics.render().unwrap().contains("of_frames_received_total 5"));
    assert!(metrics.render().unwrap().contains("of_frames_received_total 5"));
}
