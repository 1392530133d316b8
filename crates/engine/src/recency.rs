// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-frame timestamps, shared between broker and reconciler.
//!
//! The broker stamps a stream on every message it reads off the bus;
//! the reconciler reads the age to decide `connected` versus
//! `starting`/`worker_down`. Frame recency is the only connectivity
//! signal — there is no separate worker heartbeat channel.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use of_core::StreamId;

#[derive(Default)]
pub struct FrameRecency {
    last_frame: Mutex<HashMap<StreamId, Instant>>,
}

impl FrameRecency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a frame for this stream was just seen.
    pub fn mark(&self, id: &StreamId) {
        self.last_frame.lock().insert(*id, Instant::now());
    }

    /// Time since the last frame, `None` if never seen.
    pub fn age(&self, id: &StreamId) -> Option<Duration> {
        self.last_frame.lock().get(id).map(|t| t.elapsed())
    }

    /// Forget a stream, e.g. after a worker restart so stale frames
    /// from the previous worker do not count as connectivity.
    pub fn clear(&self, id: &StreamId) {
        self.last_frame.lock().remove(id);
    }
}
