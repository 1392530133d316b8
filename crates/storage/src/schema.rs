// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent schema bootstrap.
//!
//! The process must start against an empty database or a pre-populated
//! one from an earlier schema version: tables are create-if-absent,
//! later columns are add-if-absent, and the settings singleton is
//! backfilled with defaults.

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::StoreError;

const CREATE_STREAMS: &str = "
CREATE TABLE IF NOT EXISTS streams (
    id                  TEXT PRIMARY KEY,
    source_url          TEXT NOT NULL,
    latitude            REAL,
    longitude           REAL,
    orientation_deg     REAL NOT NULL DEFAULT 0,
    view_angle_deg      REAL NOT NULL DEFAULT 60,
    view_distance_m     REAL NOT NULL DEFAULT 200,
    tilt_deg            REAL NOT NULL DEFAULT 30,
    mount_height_m      REAL NOT NULL DEFAULT 5,
    location_label      TEXT NOT NULL DEFAULT '',
    grid_size           INTEGER NOT NULL DEFAULT 16,
    window_radius       INTEGER NOT NULL DEFAULT 7,
    magnitude_threshold REAL NOT NULL DEFAULT 2,
    arrow_scale         REAL NOT NULL DEFAULT 1,
    arrow_opacity_pct   REAL NOT NULL DEFAULT 80,
    gradient_intensity  REAL NOT NULL DEFAULT 1,
    show_raw_feed       INTEGER NOT NULL DEFAULT 1,
    show_arrows         INTEGER NOT NULL DEFAULT 1,
    show_magnitude      INTEGER NOT NULL DEFAULT 0,
    show_trails         INTEGER NOT NULL DEFAULT 0,
    is_active           INTEGER NOT NULL DEFAULT 0,
    worker_handle       TEXT UNIQUE,
    worker_started_at   TEXT,
    last_error          TEXT,
    connection_status   TEXT NOT NULL DEFAULT 'unknown',
    created_at          TEXT NOT NULL
)";

const CREATE_SETTINGS: &str = "
CREATE TABLE IF NOT EXISTS system_settings (
    id                        INTEGER PRIMARY KEY CHECK (id = 1),
    live_preview_fps          REAL NOT NULL,
    live_preview_jpeg_quality INTEGER NOT NULL,
    live_preview_max_width    INTEGER NOT NULL,
    orientation_offset_deg    REAL NOT NULL,
    updated_at                TEXT NOT NULL
)";

const CREATE_ALERT_EVENTS: &str = "
CREATE TABLE IF NOT EXISTS alert_events (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    receiver            TEXT NOT NULL DEFAULT '',
    group_key           TEXT NOT NULL DEFAULT '',
    notification_status TEXT NOT NULL DEFAULT '',
    status              TEXT NOT NULL DEFAULT '',
    alert_name          TEXT NOT NULL DEFAULT '',
    alert_uid           TEXT NOT NULL DEFAULT '',
    severity            TEXT NOT NULL DEFAULT '',
    stream_name         TEXT NOT NULL DEFAULT '',
    fingerprint         TEXT NOT NULL DEFAULT '',
    summary             TEXT NOT NULL DEFAULT '',
    description         TEXT NOT NULL DEFAULT '',
    starts_at           TEXT,
    ends_at             TEXT,
    raw                 TEXT NOT NULL DEFAULT 'null',
    labels              TEXT NOT NULL DEFAULT 'null',
    annotations         TEXT NOT NULL DEFAULT 'null',
    values_json         TEXT,
    received_at         TEXT NOT NULL
)";

const CREATE_GROUP_STATES: &str = "
CREATE TABLE IF NOT EXISTS alert_group_states (
    identifier  TEXT PRIMARY KEY,
    resolved    INTEGER NOT NULL DEFAULT 0,
    resolved_at TEXT,
    updated_at  TEXT NOT NULL
)";

const INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_alert_events_received_at ON alert_events (received_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_alert_events_alert_name ON alert_events (alert_name)",
    "CREATE INDEX IF NOT EXISTS idx_alert_events_fingerprint ON alert_events (fingerprint)",
];

/// Columns added after the first released schema. Applied on every
/// boot so an old database upgrades in place.
const LATER_COLUMNS: [(&str, &str, &str); 3] = [
    ("streams", "ruler_opacity_pct", "REAL NOT NULL DEFAULT 60"),
    ("streams", "show_ruler", "INTEGER NOT NULL DEFAULT 0"),
    ("streams", "config_fingerprint", "TEXT"),
];

/// Bring the schema up to date. Safe to run on every startup.
pub(crate) async fn ensure_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    for ddl in [
        CREATE_STREAMS,
        CREATE_SETTINGS,
        CREATE_ALERT_EVENTS,
        CREATE_GROUP_STATES,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }
    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }
    for (table, column, ddl) in LATER_COLUMNS {
        add_column_if_absent(pool, table, column, ddl).await?;
    }
    backfill_settings(pool).await?;
    Ok(())
}

/// `ALTER TABLE ... ADD COLUMN` guarded by a `PRAGMA table_info` probe;
/// SQLite has no ADD COLUMN IF NOT EXISTS.
async fn add_column_if_absent(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    ddl: &str,
) -> Result<(), StoreError> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await?;
    let exists = rows.iter().any(|row| {
        row.try_get::<String, _>("name")
            .map(|name| name == column)
            .unwrap_or(false)
    });
    if !exists {
        debug!(table, column, "adding schema column");
        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}"))
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Insert the settings singleton if it does not exist yet.
async fn backfill_settings(pool: &SqlitePool) -> Result<(), StoreError> {
    let defaults = of_core::SystemSettings::default();
    sqlx::query(
        "INSERT OR IGNORE INTO system_settings \
         (id, live_preview_fps, live_preview_jpeg_quality, live_preview_max_width, \
          orientation_offset_deg, updated_at) \
         VALUES (1, ?, ?, ?, ?, ?)",
    )
    .bind(defaults.live_preview_fps)
    .bind(defaults.live_preview_jpeg_quality)
    .bind(defaults.live_preview_max_width)
    .bind(defaults.orientation_offset_deg)
    .bind(defaults.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
