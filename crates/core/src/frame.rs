// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame messages published by workers on the pub/sub bus.
//!
//! Channel naming: each worker publishes on `frames/<stream-id>`; the
//! broker subscribes to the `frames/*` pattern and re-emits surviving
//! messages to WebSocket subscribers unchanged.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::id::StreamId;

/// Pattern covering every per-stream frame channel.
pub const FRAME_CHANNEL_PATTERN: &str = "frames/*";

/// The channel a given stream's worker publishes on.
pub fn frame_channel(id: &StreamId) -> String {
    format!("frames/{id}")
}

/// Recover the stream id from a channel name. Returns `None` for
/// channels outside the `frames/` namespace or with a malformed id.
pub fn parse_frame_channel(channel: &str) -> Option<StreamId> {
    let id = channel.strip_prefix("frames/")?;
    StreamId::from_str(id).ok()
}

/// One preview frame plus the metrics derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMessage {
    #[serde(rename = "type", default = "frame_kind")]
    pub kind: String,
    pub stream_id: StreamId,
    /// Wall-clock capture time, seconds since the epoch.
    pub ts: f64,
    pub w: u32,
    pub h: u32,
    pub fps: f64,
    pub vector_count: u64,
    pub avg_magnitude: f64,
    pub max_magnitude: f64,
    pub direction_degrees: f64,
    /// Agreement of flow vectors, 0 (scattered) to 1 (uniform).
    pub direction_coherence: f64,
    /// JPEG frame, base64 text.
    pub frame_b64: String,
    /// Optional per-cell vector list; passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<serde_json::Value>,
}

fn frame_kind() -> String {
    "frame".to_string()
}

impl FrameMessage {
    /// Parse a payload published by a worker.
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
