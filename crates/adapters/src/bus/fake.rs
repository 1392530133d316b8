// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process frame bus for tests.
//!
//! Backed by a broadcast channel. A lagging subscription errors out
//! like a real server closing an overflowing client, which exercises
//! the broker's reconnect path.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{BusError, BusMessage, FrameBus, FrameSubscription};

const BUS_CAPACITY: usize = 256;

/// Shared in-memory bus. Clones publish into the same channel.
#[derive(Clone)]
pub struct FakeFrameBus {
    tx: broadcast::Sender<BusMessage>,
}

impl Default for FakeFrameBus {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeFrameBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish a payload; silently dropped with no subscribers, like
    /// real pub/sub.
    pub fn publish(&self, channel: &str, payload: impl Into<Vec<u8>>) {
        let _ = self.tx.send(BusMessage {
            channel: channel.to_string(),
            payload: payload.into(),
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Match a glob-lite pattern: a single `*` wildcard, as used by
/// `frames/*`.
fn pattern_matches(pattern: &str, channel: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            channel.len() >= prefix.len() + suffix.len()
                && channel.starts_with(prefix)
                && channel.ends_with(suffix)
        }
        None => pattern == channel,
    }
}

#[async_trait]
impl FrameBus for FakeFrameBus {
    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn FrameSubscription>, BusError> {
        Ok(Box::new(FakeSubscription {
            rx: self.tx.subscribe(),
            pattern: pattern.to_string(),
        }))
    }
}

struct FakeSubscription {
    rx: broadcast::Receiver<BusMessage>,
    pattern: String,
}

#[async_trait]
impl FrameSubscription for FakeSubscription {
    async fn next_message(&mut self) -> Result<BusMessage, BusError> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if pattern_matches(&self.pattern, &msg.channel) => return Ok(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Err(BusError::Lost(format!("dropped {n} messages")));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(BusError::Lost("bus closed".to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
