// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream CRUD and lifecycle handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use of_adapters::WorkerState;
use of_core::{Stream, StreamConfig, StreamId};

use super::{ApiError, AppState};

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<Stream>>, ApiError> {
    Ok(Json(state.store.list_streams().await?))
}

/// POST /streams: persist the declaration, then converge. A runtime
/// start failure does not fail the create; it lands in the stream's
/// error facts for the caller to read back.
pub(super) async fn create(
    State(state): State<AppState>,
    Json(config): Json<StreamConfig>,
) -> Result<(StatusCode, Json<Stream>), ApiError> {
    let stream = state.store.create_stream(config).await?;
    if stream.config.is_active {
        if let Err(e) = state.reconciler.activate(&stream.id).await {
            warn!(stream = %stream.id, error = %e, "activation after create failed");
        }
    }
    let stream = state.store.get_stream(&stream.id).await?;
    Ok((StatusCode::CREATED, Json(stream)))
}

pub(super) async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<StreamId>,
) -> Result<Json<Stream>, ApiError> {
    Ok(Json(state.store.get_stream(&id).await?))
}

/// PUT /streams/{id}: full replacement; restarts the worker when the
/// stream is active and the worker-observable config changed. Store
/// write and restart happen under the stream's lock.
pub(super) async fn update(
    State(state): State<AppState>,
    Path(id): Path<StreamId>,
    Json(config): Json<StreamConfig>,
) -> Result<Json<Stream>, ApiError> {
    let update = state.reconciler.apply_config_change(&id, config).await?;
    Ok(Json(update.after))
}

/// DELETE /streams/{id}: refused while the stream is desired active;
/// a stale attached worker is cleaned up first, and 409 surfaces only
/// when that cleanup fails.
pub(super) async fn delete(
    State(state): State<AppState>,
    Path(id): Path<StreamId>,
) -> Result<StatusCode, ApiError> {
    state.reconciler.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn activate(
    State(state): State<AppState>,
    Path(id): Path<StreamId>,
) -> Result<Json<Stream>, ApiError> {
    Ok(Json(state.reconciler.activate(&id).await?))
}

pub(super) async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<StreamId>,
) -> Result<Json<Stream>, ApiError> {
    Ok(Json(state.reconciler.deactivate(&id).await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct LogsQuery {
    tail: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(super) struct WorkerLogsView {
    worker_status: String,
    worker_container_name: Option<String>,
    logs: Vec<String>,
    error: Option<String>,
}

pub(super) async fn worker_logs(
    State(state): State<AppState>,
    Path(id): Path<StreamId>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<WorkerLogsView>, ApiError> {
    let tail = query.tail.unwrap_or(100).min(1000);
    let (stream, status, logs) = state.reconciler.worker_logs(&id, tail).await?;

    let worker_status = match status {
        Some(ref s) => match s.state {
            WorkerState::Running => "running",
            WorkerState::Starting => "starting",
            WorkerState::Exited => "exited",
            WorkerState::Missing => "missing",
        },
        None => "inactive",
    }
    .to_string();

    Ok(Json(WorkerLogsView {
        worker_status,
        worker_container_name: stream.worker_handle.clone(),
        logs,
        error: stream.last_error,
    }))
}

#[cfg(test)]
#[path = "streams_tests.rs"]
mod tests;
