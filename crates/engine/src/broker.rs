// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame broker: bus → throttle → hub.
//!
//! One task owns the pattern subscription. A lost subscription is
//! re-opened with exponential backoff while subscribers stay attached;
//! they simply see no frames until the bus is back.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use of_adapters::{BusMessage, FrameBus};
use of_core::{parse_frame_channel, FrameMessage, StreamId, FRAME_CHANNEL_PATTERN};

use crate::hub::SubscriptionHub;
use crate::metrics::EngineMetrics;
use crate::recency::FrameRecency;

/// Reconnect backoff tuning.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub backoff_initial: Duration,
    pub backoff_cap: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backoff_initial: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(10),
        }
    }
}

/// Subscribes to the frame namespace and fans out to the hub under the
/// global per-stream FPS cap.
pub struct FrameBroker {
    bus: Arc<dyn FrameBus>,
    hub: Arc<SubscriptionHub>,
    fps_cap: watch::Receiver<f64>,
    recency: Arc<FrameRecency>,
    metrics: Arc<EngineMetrics>,
    config: BrokerConfig,
    last_forwarded: Mutex<HashMap<StreamId, Instant>>,
}

impl FrameBroker {
    pub fn new(
        bus: Arc<dyn FrameBus>,
        hub: Arc<SubscriptionHub>,
        fps_cap: watch::Receiver<f64>,
        recency: Arc<FrameRecency>,
        metrics: Arc<EngineMetrics>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            bus,
            hub,
            fps_cap,
            recency,
            metrics,
            config,
            last_forwarded: Mutex::new(HashMap::new()),
        }
    }

    /// Run until shutdown. Owns the subscription lifecycle.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut backoff = self.config.backoff_initial;
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.bus.subscribe(FRAME_CHANNEL_PATTERN).await {
                Ok(mut subscription) => {
                    info!(pattern = FRAME_CHANNEL_PATTERN, "frame subscription open");
                    backoff = self.config.backoff_initial;
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                info!("frame broker stopped");
                                return;
                            }
                            msg = subscription.next_message() => match msg {
                                Ok(msg) => self.handle_message(msg),
                                Err(e) => {
                                    warn!(error = %e, "frame subscription lost, reconnecting");
                                    self.metrics.broker_reconnects.fetch_add(1, Ordering::Relaxed);
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "frame bus connect failed");
                    self.metrics.broker_reconnects.fetch_add(1, Ordering::Relaxed);
                }
            }

            // disconnected: back off, subscribers stay attached
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.backoff_cap);
        }
    }

    fn handle_message(&self, msg: BusMessage) {
        self.metrics.frames_received.fetch_add(1, Ordering::Relaxed);

        let Some(stream_id) = parse_frame_channel(&msg.channel) else {
            debug!(channel = %msg.channel, "message outside the frame namespace");
            return;
        };
        let frame = match FrameMessage::from_json(&msg.payload) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(channel = %msg.channel, error = %e, "unparseable frame payload");
                return;
            }
        };
        // the channel is authoritative for identity
        if frame.stream_id != stream_id {
            debug!(
                channel = %msg.channel,
                payload_stream = %frame.stream_id,
                "frame payload names a different stream, dropping"
            );
            return;
        }

        self.recency.mark(&stream_id);

        let fps = *self.fps_cap.borrow();
        let min_interval = Duration::from_secs_f64(1.0 / fps.max(0.1));
        let now = Instant::now();
        {
            let mut last = self.last_forwarded.lock();
            if let Some(prev) = last.get(&stream_id) {
                if now.duration_since(*prev) < min_interval {
                    self.metrics.frames_throttled.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
            last.insert(stream_id, now);
        }

        self.hub.dispatch(&frame);
        self.metrics.frames_forwarded.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
