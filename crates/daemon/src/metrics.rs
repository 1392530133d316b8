// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process metrics in Prometheus text exposition.
//!
//! The engine keeps plain atomic counters; this module snapshots them
//! into a fresh registry per scrape, which keeps the engine crates free
//! of the metrics stack.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use of_engine::{EngineMetrics, SubscriptionHub};

/// Daemon-level metrics handle.
pub struct AppMetrics {
    pub engine: Arc<EngineMetrics>,
    hub: Arc<SubscriptionHub>,
    pub http_requests: AtomicU64,
}

impl AppMetrics {
    pub fn new(engine: Arc<EngineMetrics>, hub: Arc<SubscriptionHub>) -> Self {
        Self {
            engine,
            hub,
            http_requests: AtomicU64::new(0),
        }
    }

    /// Render the current counters as exposition text.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let registry = Registry::new();

        let counters = [
            (
                "of_frames_received_total",
                "Frame messages read off the pub/sub bus",
                self.engine.frames_received.load(Ordering::Relaxed),
            ),
            (
                "of_frames_forwarded_total",
                "Frames forwarded to subscribers after throttling",
                self.engine.frames_forwarded.load(Ordering::Relaxed),
            ),
            (
                "of_frames_throttled_total",
                "Frames dropped by the per-stream FPS cap",
                self.engine.frames_throttled.load(Ordering::Relaxed),
            ),
            (
                "of_frames_dropped_total",
                "Frames evicted from subscriber queues",
                self.engine.frames_dropped.load(Ordering::Relaxed),
            ),
            (
                "of_broker_reconnects_total",
                "Pub/sub reconnect attempts",
                self.engine.broker_reconnects.load(Ordering::Relaxed),
            ),
            (
                "of_reconcile_passes_total",
                "Completed reconciliation sweeps",
                self.engine.reconcile_passes.load(Ordering::Relaxed),
            ),
            (
                "of_worker_restarts_total",
                "Worker restarts performed by the reconciler",
                self.engine.worker_restarts.load(Ordering::Relaxed),
            ),
            (
                "of_http_requests_total",
                "Control API requests served",
                self.http_requests.load(Ordering::Relaxed),
            ),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::new(name, help)?;
            counter.inc_by(value);
            registry.register(Box::new(counter))?;
        }

        let subscribers = IntGauge::new("of_ws_subscribers", "Live frame subscribers")?;
        subscribers.set(self.hub.subscriber_count() as i64);
        registry.register(Box::new(subscribers))?;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
