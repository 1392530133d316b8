// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only alert events and manual group-resolution state.

use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use of_core::{AlertEvent, AlertGroupState, NewAlertEvent, ValidationError};

use crate::error::StoreError;
use crate::store::Store;

/// Longest accepted group identifier.
const MAX_IDENTIFIER: usize = 1024;

fn json_from_column(row: &SqliteRow, column: &str) -> Result<Value, StoreError> {
    let text: String = row.try_get(column)?;
    serde_json::from_str(&text)
        .map_err(|e| StoreError::Corrupt(format!("alert column {column}: {e}")))
}

fn event_from_row(row: &SqliteRow) -> Result<AlertEvent, StoreError> {
    let values_json: Option<String> = row.try_get("values_json")?;
    let values = match values_json {
        Some(text) => Some(
            serde_json::from_str(&text)
                .map_err(|e| StoreError::Corrupt(format!("alert values: {e}")))?,
        ),
        None => None,
    };
    Ok(AlertEvent {
        id: row.try_get("id")?,
        receiver: row.try_get("receiver")?,
        group_key: row.try_get("group_key")?,
        notification_status: row.try_get("notification_status")?,
        status: row.try_get("status")?,
        alert_name: row.try_get("alert_name")?,
        alert_uid: row.try_get("alert_uid")?,
        severity: row.try_get("severity")?,
        stream_name: row.try_get("stream_name")?,
        fingerprint: row.try_get("fingerprint")?,
        summary: row.try_get("summary")?,
        description: row.try_get("description")?,
        starts_at: row.try_get("starts_at")?,
        ends_at: row.try_get("ends_at")?,
        raw: json_from_column(row, "raw")?,
        labels: json_from_column(row, "labels")?,
        annotations: json_from_column(row, "annotations")?,
        values,
        received_at: row.try_get("received_at")?,
    })
}

fn group_state_from_row(row: &SqliteRow) -> Result<AlertGroupState, StoreError> {
    Ok(AlertGroupState {
        identifier: row.try_get("identifier")?,
        resolved: row.try_get("resolved")?,
        resolved_at: row.try_get("resolved_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const EVENT_COLUMNS: &str = "id, receiver, group_key, notification_status, status, \
    alert_name, alert_uid, severity, stream_name, fingerprint, summary, description, \
    starts_at, ends_at, raw, labels, annotations, values_json, received_at";

impl Store {
    /// Append one alert event, returning its row id.
    pub async fn insert_alert_event(&self, event: &NewAlertEvent) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO alert_events (receiver, group_key, notification_status, status, \
             alert_name, alert_uid, severity, stream_name, fingerprint, summary, description, \
             starts_at, ends_at, raw, labels, annotations, values_json, received_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.receiver)
        .bind(&event.group_key)
        .bind(&event.notification_status)
        .bind(&event.status)
        .bind(&event.alert_name)
        .bind(&event.alert_uid)
        .bind(&event.severity)
        .bind(&event.stream_name)
        .bind(&event.fingerprint)
        .bind(&event.summary)
        .bind(&event.description)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(event.raw.to_string())
        .bind(event.labels.to_string())
        .bind(event.annotations.to_string())
        .bind(event.values.as_ref().map(|v| v.to_string()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent events first.
    pub async fn list_alert_events(&self, limit: u32) -> Result<Vec<AlertEvent>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM alert_events ORDER BY received_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    /// Every stored event, oldest first. Group derivation needs the
    /// full history to honor resolution overrides.
    pub async fn list_alert_events_all(&self) -> Result<Vec<AlertEvent>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM alert_events ORDER BY received_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    /// Record or update an operator's resolution override.
    pub async fn upsert_alert_group_state(
        &self,
        identifier: &str,
        resolved: bool,
    ) -> Result<AlertGroupState, StoreError> {
        if identifier.is_empty() {
            return Err(StoreError::Validation(ValidationError::new(
                "identifier",
                "must not be empty",
            )));
        }
        if identifier.len() > MAX_IDENTIFIER {
            return Err(StoreError::Validation(ValidationError::new(
                "identifier",
                format!("longer than {MAX_IDENTIFIER} characters"),
            )));
        }
        let now = Utc::now();
        let resolved_at = resolved.then_some(now);
        sqlx::query(
            "INSERT INTO alert_group_states (identifier, resolved, resolved_at, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (identifier) DO UPDATE SET resolved = excluded.resolved, \
             resolved_at = excluded.resolved_at, updated_at = excluded.updated_at",
        )
        .bind(identifier)
        .bind(resolved)
        .bind(resolved_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(AlertGroupState {
            identifier: identifier.to_string(),
            resolved,
            resolved_at,
            updated_at: now,
        })
    }

    pub async fn list_alert_group_states(&self) -> Result<Vec<AlertGroupState>, StoreError> {
        let rows = sqlx::query(
            "SELECT identifier, resolved, resolved_at, updated_at FROM alert_group_states \
             ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(group_state_from_row).collect()
    }
}

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;
