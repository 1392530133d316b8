// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream record CRUD and runtime-fact writes.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

use of_core::{ConnectionStatus, RuntimeFacts, Stream, StreamConfig, StreamId};

use crate::error::StoreError;
use crate::store::Store;

/// Result of a full-replacement update: the pre-update snapshot plus
/// the stored result, so callers can diff configs without re-reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamUpdate {
    pub before: Stream,
    pub after: Stream,
}

const STREAM_COLUMNS: &str = "id, source_url, latitude, longitude, orientation_deg, \
    view_angle_deg, view_distance_m, tilt_deg, mount_height_m, location_label, \
    grid_size, window_radius, magnitude_threshold, arrow_scale, arrow_opacity_pct, \
    gradient_intensity, ruler_opacity_pct, show_raw_feed, show_arrows, show_magnitude, \
    show_trails, show_ruler, is_active, worker_handle, worker_started_at, last_error, \
    connection_status, config_fingerprint, created_at";

fn stream_from_row(row: &SqliteRow) -> Result<Stream, StoreError> {
    let id: String = row.try_get("id")?;
    let id = StreamId::from_str(&id)
        .map_err(|e| StoreError::Corrupt(format!("stream id {id:?}: {e}")))?;
    let status: String = row.try_get("connection_status")?;
    let connection_status = ConnectionStatus::from_str(&status)
        .map_err(|e| StoreError::Corrupt(format!("stream {id}: {e}")))?;

    Ok(Stream {
        id,
        config: StreamConfig {
            source_url: row.try_get("source_url")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            orientation_deg: row.try_get("orientation_deg")?,
            view_angle_deg: row.try_get("view_angle_deg")?,
            view_distance_m: row.try_get("view_distance_m")?,
            tilt_deg: row.try_get("tilt_deg")?,
            mount_height_m: row.try_get("mount_height_m")?,
            location_label: row.try_get("location_label")?,
            grid_size: row.try_get("grid_size")?,
            window_radius: row.try_get("window_radius")?,
            magnitude_threshold: row.try_get("magnitude_threshold")?,
            arrow_scale: row.try_get("arrow_scale")?,
            arrow_opacity_pct: row.try_get("arrow_opacity_pct")?,
            gradient_intensity: row.try_get("gradient_intensity")?,
            ruler_opacity_pct: row.try_get("ruler_opacity_pct")?,
            show_raw_feed: row.try_get("show_raw_feed")?,
            show_arrows: row.try_get("show_arrows")?,
            show_magnitude: row.try_get("show_magnitude")?,
            show_trails: row.try_get("show_trails")?,
            show_ruler: row.try_get("show_ruler")?,
            is_active: row.try_get("is_active")?,
        },
        worker_handle: row.try_get("worker_handle")?,
        worker_started_at: row.try_get("worker_started_at")?,
        last_error: row.try_get("last_error")?,
        connection_status,
        config_fingerprint: row.try_get("config_fingerprint")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Store {
    /// Validate a declaration, assign identity, and insert.
    ///
    /// `is_active = true` in the declaration does not start a worker;
    /// the caller invokes the reconciler after commit.
    pub async fn create_stream(&self, config: StreamConfig) -> Result<Stream, StoreError> {
        config.validate()?;
        let stream = Stream::from_config(config);
        let c = &stream.config;
        sqlx::query(
            "INSERT INTO streams (id, source_url, latitude, longitude, orientation_deg, \
             view_angle_deg, view_distance_m, tilt_deg, mount_height_m, location_label, \
             grid_size, window_radius, magnitude_threshold, arrow_scale, arrow_opacity_pct, \
             gradient_intensity, ruler_opacity_pct, show_raw_feed, show_arrows, show_magnitude, \
             show_trails, show_ruler, is_active, connection_status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(stream.id.to_string())
        .bind(&c.source_url)
        .bind(c.latitude)
        .bind(c.longitude)
        .bind(c.orientation_deg)
        .bind(c.view_angle_deg)
        .bind(c.view_distance_m)
        .bind(c.tilt_deg)
        .bind(c.mount_height_m)
        .bind(&c.location_label)
        .bind(c.grid_size)
        .bind(c.window_radius)
        .bind(c.magnitude_threshold)
        .bind(c.arrow_scale)
        .bind(c.arrow_opacity_pct)
        .bind(c.gradient_intensity)
        .bind(c.ruler_opacity_pct)
        .bind(c.show_raw_feed)
        .bind(c.show_arrows)
        .bind(c.show_magnitude)
        .bind(c.show_trails)
        .bind(c.show_ruler)
        .bind(c.is_active)
        .bind(stream.connection_status.as_str())
        .bind(stream.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::conflict_on_unique(e, "stream already exists"))?;
        Ok(stream)
    }

    pub async fn get_stream(&self, id: &StreamId) -> Result<Stream, StoreError> {
        let row = sqlx::query(&format!("SELECT {STREAM_COLUMNS} FROM streams WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("stream {id}")))?;
        stream_from_row(&row)
    }

    pub async fn list_streams(&self) -> Result<Vec<Stream>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {STREAM_COLUMNS} FROM streams ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(stream_from_row).collect()
    }

    /// Full replacement of the mutable (declared) fields. Runtime facts
    /// are untouched.
    pub async fn update_stream(
        &self,
        id: &StreamId,
        config: StreamConfig,
    ) -> Result<StreamUpdate, StoreError> {
        config.validate()?;
        let before = self.get_stream(id).await?;
        sqlx::query(
            "UPDATE streams SET source_url = ?, latitude = ?, longitude = ?, \
             orientation_deg = ?, view_angle_deg = ?, view_distance_m = ?, tilt_deg = ?, \
             mount_height_m = ?, location_label = ?, grid_size = ?, window_radius = ?, \
             magnitude_threshold = ?, arrow_scale = ?, arrow_opacity_pct = ?, \
             gradient_intensity = ?, ruler_opacity_pct = ?, show_raw_feed = ?, \
             show_arrows = ?, show_magnitude = ?, show_trails = ?, show_ruler = ?, \
             is_active = ? WHERE id = ?",
        )
        .bind(&config.source_url)
        .bind(config.latitude)
        .bind(config.longitude)
        .bind(config.orientation_deg)
        .bind(config.view_angle_deg)
        .bind(config.view_distance_m)
        .bind(config.tilt_deg)
        .bind(config.mount_height_m)
        .bind(&config.location_label)
        .bind(config.grid_size)
        .bind(config.window_radius)
        .bind(config.magnitude_threshold)
        .bind(config.arrow_scale)
        .bind(config.arrow_opacity_pct)
        .bind(config.gradient_intensity)
        .bind(config.ruler_opacity_pct)
        .bind(config.show_raw_feed)
        .bind(config.show_arrows)
        .bind(config.show_magnitude)
        .bind(config.show_trails)
        .bind(config.show_ruler)
        .bind(config.is_active)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        let mut after = before.clone();
        after.config = config;
        Ok(StreamUpdate { before, after })
    }

    /// Flip only the desired-state flag.
    pub async fn set_active(&self, id: &StreamId, active: bool) -> Result<Stream, StoreError> {
        let result = sqlx::query("UPDATE streams SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("stream {id}")));
        }
        self.get_stream(id).await
    }

    /// Delete a stream record. Fails with `Conflict` while a worker
    /// handle is still attached; callers deactivate first.
    pub async fn delete_stream(&self, id: &StreamId) -> Result<(), StoreError> {
        let stream = self.get_stream(id).await?;
        if let Some(handle) = stream.worker_handle {
            return Err(StoreError::Conflict(format!(
                "stream {id} still has worker {handle}"
            )));
        }
        sqlx::query("DELETE FROM streams WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace the observed runtime facts. Used exclusively by the
    /// reconciler, which serializes writes per stream.
    pub async fn set_runtime_facts(
        &self,
        id: &StreamId,
        facts: &RuntimeFacts,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE streams SET worker_handle = ?, worker_started_at = ?, last_error = ?, \
             connection_status = ?, config_fingerprint = ? WHERE id = ?",
        )
        .bind(&facts.worker_handle)
        .bind(facts.worker_started_at)
        .bind(&facts.last_error)
        .bind(facts.connection_status.as_str())
        .bind(&facts.config_fingerprint)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::conflict_on_unique(e, "worker handle already attached"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("stream {id}")));
        }
        Ok(())
    }

    /// Streams with `is_active = true`, for fleet-wide sweeps.
    pub async fn list_active_streams(&self) -> Result<Vec<Stream>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {STREAM_COLUMNS} FROM streams WHERE is_active = 1 ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(stream_from_row).collect()
    }
}

#[cfg(test)]
#[path = "streams_tests.rs"]
mod tests;
