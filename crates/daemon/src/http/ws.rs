// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket frame bridge.
//!
//! One hub subscriber per socket. The server only writes: frames as
//! JSON text plus keepalive pings. Client writes are ignored, client
//! liveness is bounded by the pong timeout. Close codes: 1008 when the
//! hub evicted the subscriber for overrun, 1011 on internal error.

use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use of_core::StreamId;

use super::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(15);
const PONG_TIMEOUT: Duration = Duration::from_secs(30);

/// Policy violation (subscriber overrun, ping timeout).
const CLOSE_POLICY: u16 = 1008;
/// Internal error.
const CLOSE_INTERNAL: u16 = 1011;

#[derive(Debug, Deserialize)]
pub(super) struct WsQuery {
    stream_id: Option<StreamId>,
}

pub(super) async fn frames(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| bridge(socket, state, query.stream_id))
}

async fn bridge(socket: WebSocket, state: AppState, filter: Option<StreamId>) {
    let mut subscriber = state.hub.subscribe(filter);
    debug!(subscriber = subscriber.id(), ?filter, "frame socket open");

    let (mut sink, mut source) = socket.split();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            frame = subscriber.recv() => match frame {
                Some(frame) => {
                    let text = match frame.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "frame serialization failed");
                            let _ = sink
                                .send(close_frame(CLOSE_INTERNAL, "serialization failure"))
                                .await;
                            break;
                        }
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                // hub closed us: overrun policy or daemon shutdown
                None => {
                    let (code, reason) = if subscriber.was_overrun() {
                        (CLOSE_POLICY, "subscriber overrun")
                    } else {
                        (1000, "shutting down")
                    };
                    let _ = sink.send(close_frame(code, reason)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if last_pong.elapsed() > PONG_TIMEOUT {
                    debug!(subscriber = subscriber.id(), "pong timeout, closing");
                    let _ = sink.send(close_frame(CLOSE_POLICY, "ping timeout")).await;
                    break;
                }
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Pong(_))) => last_pong = Instant::now(),
                Some(Ok(Message::Close(_))) | None => break,
                // the server initiates no reads; client text is ignored
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
    }

    debug!(subscriber = subscriber.id(), "frame socket closed");
}

fn close_frame(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
