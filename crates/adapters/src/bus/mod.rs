// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame pub/sub bus.
//!
//! Workers publish one JSON payload per preview frame on their
//! per-stream channel; the broker consumes the whole namespace through
//! a pattern subscription. Any error from a subscription means the
//! connection is gone — the broker drops it and reconnects with
//! backoff. Frames are ephemeral: nothing is buffered on the bus side.

#[cfg(any(test, feature = "test-support"))]
mod fake;
mod redis;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeFrameBus;
pub use redis::RedisFrameBus;

use async_trait::async_trait;
use thiserror::Error;

/// Bus failure. Always terminal for the current subscription.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("pub/sub connect failed: {0}")]
    Connect(String),

    #[error("pub/sub subscription lost: {0}")]
    Lost(String),
}

/// One raw message as published on the bus.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// Connection factory for pattern subscriptions.
#[async_trait]
pub trait FrameBus: Send + Sync + 'static {
    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn FrameSubscription>, BusError>;
}

/// A live pattern subscription. Dropped to unsubscribe.
#[async_trait]
pub trait FrameSubscription: Send {
    /// Wait for the next message. An error means the subscription is
    /// dead and the caller must resubscribe.
    async fn next_message(&mut self) -> Result<BusMessage, BusError>;
}
