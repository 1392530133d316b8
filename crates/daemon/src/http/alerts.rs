// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert ingest and query handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use of_core::{derive_groups, events_from_envelope, AlertEvent, AlertGroup, AlertGroupState};

use super::{ApiError, AppState};

/// POST /alerts/webhook: store one event per contained alert. The
/// envelope shape is arbitrary JSON; anything unrecognized simply
/// yields no events rather than an error, so a misconfigured notifier
/// never sees retry storms.
pub(super) async fn webhook(
    State(state): State<AppState>,
    Json(envelope): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let events = events_from_envelope(&envelope);
    debug!(count = events.len(), "alert webhook received");
    for event in &events {
        state.store.insert_alert_event(event).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(super) struct AlertsQuery {
    limit: Option<u32>,
}

pub(super) async fn list(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<AlertEvent>>, ApiError> {
    let limit = query.limit.unwrap_or(100).min(1000);
    Ok(Json(state.store.list_alert_events(limit).await?))
}

/// GET /alerts/groups: derived view over all stored events plus the
/// manual resolution overrides.
pub(super) async fn groups(
    State(state): State<AppState>,
) -> Result<Json<Vec<AlertGroup>>, ApiError> {
    let events = state.store.list_alert_events_all().await?;
    let states = state.store.list_alert_group_states().await?;
    Ok(Json(derive_groups(&events, &states)))
}

pub(super) async fn group_states(
    State(state): State<AppState>,
) -> Result<Json<Vec<AlertGroupState>>, ApiError> {
    Ok(Json(state.store.list_alert_group_states().await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct GroupStateBody {
    identifier: String,
    resolved: bool,
}

pub(super) async fn upsert_group_state(
    State(state): State<AppState>,
    Json(body): Json<GroupStateBody>,
) -> Result<Json<AlertGroupState>, ApiError> {
    let stored = state
        .store
        .upsert_alert_group_state(&body.identifier, body.resolved)
        .await?;
    Ok(Json(stored))
}

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;
