// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert events and alert-group derivation.
//!
//! Inbound notifications follow the Alertmanager webhook shape: an
//! envelope with `receiver`, `status`, `groupKey` and an `alerts` array.
//! The envelope is arbitrary JSON in practice, so parsing extracts the
//! known fields opportunistically and preserves the raw document
//! verbatim for each stored event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Statuses that count as "the group is live again" when deciding
/// whether a manual resolution still holds.
const OPEN_STATUSES: [&str; 3] = ["firing", "alerting", "pending"];

/// Normalize free-form severity labels into `critical`/`warning`/`info`.
/// Unrecognized values pass through lowercased.
pub fn normalize_severity(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "critical" | "fatal" | "high" | "emergency" => "critical".to_string(),
        "warning" | "warn" | "medium" => "warning".to_string(),
        "info" | "informational" | "low" => "info".to_string(),
        other => other.to_string(),
    }
}

/// Group identifier: the fingerprint when the notifier supplies one,
/// otherwise a composite that stays stable across repeats of the same
/// alert on the same stream.
fn derive_identifier(
    fingerprint: &str,
    alert_name: &str,
    stream_name: &str,
    severity: &str,
) -> String {
    if !fingerprint.is_empty() {
        fingerprint.to_string()
    } else {
        format!("{alert_name}|{stream_name}|{severity}")
    }
}

/// Alertmanager webhook envelope, parsed leniently.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Envelope {
    receiver: String,
    status: String,
    group_key: String,
    alerts: Vec<EnvelopeAlert>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct EnvelopeAlert {
    status: String,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    values: Option<Value>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    fingerprint: String,
}

/// One alert extracted from an envelope, ready for insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlertEvent {
    pub receiver: String,
    pub group_key: String,
    /// Envelope-level status.
    pub notification_status: String,
    /// Per-alert status.
    pub status: String,
    pub alert_name: String,
    pub alert_uid: String,
    pub severity: String,
    pub stream_name: String,
    pub fingerprint: String,
    pub summary: String,
    pub description: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// The full inbound envelope, verbatim.
    pub raw: Value,
    pub labels: Value,
    pub annotations: Value,
    pub values: Option<Value>,
}

/// Split an inbound envelope into one event per contained alert.
///
/// Never fails on shape mismatches: unknown fields are ignored and
/// missing ones default to empty, per tagged-variant-on-read. An
/// envelope with no `alerts` array yields no events.
pub fn events_from_envelope(raw: &Value) -> Vec<NewAlertEvent> {
    let envelope: Envelope = serde_json::from_value(raw.clone()).unwrap_or_default();

    envelope
        .alerts
        .into_iter()
        .map(|alert| {
            let label = |key: &str| alert.labels.get(key).cloned().unwrap_or_default();
            let annotation = |key: &str| alert.annotations.get(key).cloned().unwrap_or_default();
            let severity = normalize_severity(&label("severity"));
            NewAlertEvent {
                receiver: envelope.receiver.clone(),
                group_key: envelope.group_key.clone(),
                notification_status: envelope.status.clone(),
                status: alert.status.clone(),
                alert_name: label("alertname"),
                alert_uid: alert
                    .labels
                    .get("__alert_rule_uid__")
                    .or_else(|| alert.labels.get("alert_uid"))
                    .cloned()
                    .unwrap_or_default(),
                severity,
                stream_name: label("stream_name"),
                fingerprint: alert.fingerprint.clone(),
                summary: annotation("summary"),
                description: annotation("description"),
                starts_at: alert.starts_at,
                ends_at: alert.ends_at,
                raw: raw.clone(),
                labels: serde_json::to_value(&alert.labels).unwrap_or(Value::Null),
                annotations: serde_json::to_value(&alert.annotations).unwrap_or(Value::Null),
                values: alert.values,
            }
        })
        .collect()
}

/// A stored alert event (append-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: i64,
    pub receiver: String,
    pub group_key: String,
    pub notification_status: String,
    pub status: String,
    pub alert_name: String,
    pub alert_uid: String,
    pub severity: String,
    pub stream_name: String,
    pub fingerprint: String,
    pub summary: String,
    pub description: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub raw: Value,
    pub labels: Value,
    pub annotations: Value,
    pub values: Option<Value>,
    pub received_at: DateTime<Utc>,
}

impl AlertEvent {
    /// The group this event belongs to.
    pub fn identifier(&self) -> String {
        derive_identifier(
            &self.fingerprint,
            &self.alert_name,
            &self.stream_name,
            &self.severity,
        )
    }
}

/// Operator-asserted resolution override for an alert group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertGroupState {
    pub identifier: String,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Derived view of an alert group: all events sharing an identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertGroup {
    pub identifier: String,
    pub alert_name: String,
    pub stream_name: String,
    /// Effective status: `resolved` when a manual override holds,
    /// otherwise the latest event's status.
    pub status: String,
    pub latest_status: String,
    pub latest_severity: String,
    pub event_count: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Group events by identifier and apply manual-resolution overrides.
///
/// A manual `resolved` only holds while no newer firing/alerting/pending
/// event has arrived since `resolved_at`; a later open event re-opens
/// the group without touching the stored override.
pub fn derive_groups(events: &[AlertEvent], states: &[AlertGroupState]) -> Vec<AlertGroup> {
    let mut by_id: BTreeMap<String, Vec<&AlertEvent>> = BTreeMap::new();
    for event in events {
        by_id.entry(event.identifier()).or_default().push(event);
    }

    let mut groups: Vec<AlertGroup> = by_id
        .into_iter()
        .map(|(identifier, mut members)| {
            members.sort_by_key(|e| e.received_at);
            // non-empty by construction
            let latest = members[members.len() - 1];
            let first = members[0];

            let manual = states.iter().find(|s| s.identifier == identifier);
            let manual_holds = manual.is_some_and(|state| {
                state.resolved
                    && !members.iter().any(|e| {
                        let newer = match state.resolved_at {
                            Some(at) => e.received_at > at,
                            None => true,
                        };
                        newer && OPEN_STATUSES.contains(&e.status.to_ascii_lowercase().as_str())
                    })
            });

            let latest_status = latest.status.to_ascii_lowercase();
            AlertGroup {
                identifier,
                alert_name: latest.alert_name.clone(),
                stream_name: latest.stream_name.clone(),
                status: if manual_holds {
                    "resolved".to_string()
                } else {
                    latest_status.clone()
                },
                latest_status,
                latest_severity: latest.severity.clone(),
                event_count: members.len(),
                first_seen: first.received_at,
                last_seen: latest.received_at,
                resolved: manual_holds,
                resolved_at: manual.and_then(|s| s.resolved_at),
            }
        })
        .collect();

    groups.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
    groups
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
