// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Singleton system-settings row.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use of_core::{SettingsUpdate, SystemSettings};

use crate::error::StoreError;
use crate::store::Store;

fn settings_from_row(row: &SqliteRow) -> Result<SystemSettings, StoreError> {
    Ok(SystemSettings {
        live_preview_fps: row.try_get("live_preview_fps")?,
        live_preview_jpeg_quality: row.try_get("live_preview_jpeg_quality")?,
        live_preview_max_width: row.try_get("live_preview_max_width")?,
        orientation_offset_deg: row.try_get("orientation_offset_deg")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl Store {
    pub async fn get_settings(&self) -> Result<SystemSettings, StoreError> {
        let row = sqlx::query(
            "SELECT live_preview_fps, live_preview_jpeg_quality, live_preview_max_width, \
             orientation_offset_deg, updated_at FROM system_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => settings_from_row(&row),
            // bootstrap backfills the row; tolerate a fresh database anyway
            None => {
                self.bootstrap().await?;
                Ok(SystemSettings::default())
            }
        }
    }

    /// Validate and persist a settings change, returning the stored
    /// result. Cascading side effects (throttle updates, worker
    /// restarts) are the settings manager's job.
    pub async fn update_settings(
        &self,
        update: &SettingsUpdate,
    ) -> Result<SystemSettings, StoreError> {
        update.validate()?;
        let next = update.apply_to(&self.get_settings().await?);
        sqlx::query(
            "UPDATE system_settings SET live_preview_fps = ?, live_preview_jpeg_quality = ?, \
             live_preview_max_width = ?, orientation_offset_deg = ?, updated_at = ? WHERE id = 1",
        )
        .bind(next.live_preview_fps)
        .bind(next.live_preview_jpeg_quality)
        .bind(next.live_preview_max_width)
        .bind(next.orientation_offset_deg)
        .bind(next.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(next)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
