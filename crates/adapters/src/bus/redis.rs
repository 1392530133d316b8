// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis pub/sub implementation of the frame bus.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::debug;

use super::{BusError, BusMessage, FrameBus, FrameSubscription};

/// Frame bus over a Redis server.
#[derive(Clone)]
pub struct RedisFrameBus {
    client: redis::Client,
}

impl RedisFrameBus {
    /// Validate the URL and build a lazy client; the first `subscribe`
    /// opens the actual connection.
    pub fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FrameBus for RedisFrameBus {
    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn FrameSubscription>, BusError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        pubsub
            .psubscribe(pattern)
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        debug!(pattern, "pattern subscription open");
        Ok(Box::new(RedisSubscription {
            stream: pubsub.into_on_message().boxed(),
        }))
    }
}

struct RedisSubscription {
    stream: BoxStream<'static, redis::Msg>,
}

#[async_trait]
impl FrameSubscription for RedisSubscription {
    async fn next_message(&mut self) -> Result<BusMessage, BusError> {
        match self.stream.next().await {
            Some(msg) => Ok(BusMessage {
                channel: msg.get_channel_name().to_string(),
                payload: msg.get_payload_bytes().to_vec(),
            }),
            // the server dropped us (shutdown, or it closed a client
            // whose output buffer overflowed); resubscribe
            None => Err(BusError::Lost("connection closed by server".to_string())),
        }
    }
}
