// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control API surface: HTTP routes plus the WebSocket frame bridge.
//!
//! Every stream mutation goes through a reconciler method that takes
//! the stream's serialization lock and performs the store write plus
//! the runtime-driver action under it, so concurrent calls reach the
//! driver in submission order. Reads are lock-free and may return
//! slightly stale runtime facts.

mod alerts;
mod error;
mod settings;
mod streams;
mod ws;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use of_engine::{Reconciler, SettingsManager, SubscriptionHub};
use of_storage::Store;

use crate::metrics::AppMetrics;
pub use error::ApiError;

/// Shared handler context.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub reconciler: Arc<Reconciler>,
    pub hub: Arc<SubscriptionHub>,
    pub settings: Arc<SettingsManager>,
    pub metrics: Arc<AppMetrics>,
}

/// Build the full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/streams", get(streams::list).post(streams::create))
        .route(
            "/streams/:id",
            get(streams::get_one).put(streams::update).delete(streams::delete),
        )
        .route("/streams/:id/activate", post(streams::activate))
        .route("/streams/:id/deactivate", post(streams::deactivate))
        .route("/streams/:id/worker-logs", get(streams::worker_logs))
        .route(
            "/settings/system",
            get(settings::get_settings).put(settings::put_settings),
        )
        .route("/alerts/webhook", post(alerts::webhook))
        .route("/alerts", get(alerts::list))
        .route("/alerts/groups", get(alerts::groups))
        .route(
            "/alerts/group-states",
            get(alerts::group_states).post(alerts::upsert_group_state),
        )
        .route("/ws/frames", get(ws::frames))
        .route("/metrics", get(metrics_text))
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_text(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(format!("metrics encoding: {e}")))
}

async fn count_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    state.metrics.http_requests.fetch_add(1, Ordering::Relaxed);
    next.run(req).await.into_response()
}

#[cfg(test)]
#[path = "test_fixtures.rs"]
pub(crate) mod test_fixtures;

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
