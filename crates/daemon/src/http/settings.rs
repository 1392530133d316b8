// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System settings handlers.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use of_core::{SettingsUpdate, SystemSettings};
use of_engine::SettingsOutcome;

use super::{ApiError, AppState};

pub(super) async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SystemSettings>, ApiError> {
    Ok(Json(state.settings.current().await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct SettingsBody {
    #[serde(flatten)]
    update: SettingsUpdate,
    #[serde(default)]
    restart_workers: bool,
}

/// PUT /settings/system: persist, cascade the FPS cap, and optionally
/// restart the fleet serially. Per-stream restart failures come back
/// in `restart_errors`; nothing is rolled back.
pub(super) async fn put_settings(
    State(state): State<AppState>,
    Json(body): Json<SettingsBody>,
) -> Result<Json<SettingsOutcome>, ApiError> {
    let outcome = state
        .settings
        .update(body.update, body.restart_workers)
        .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
