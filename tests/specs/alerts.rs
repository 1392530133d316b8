// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert ingest and group-resolution scenarios.

use serde_json::json;

use crate::support::SpecCtx;

fn envelope(status: &str, fingerprint: &str, alerts: usize) -> serde_json::Value {
    let alert = json!({
        "status": status,
        "labels": {
            "alertname": "HighMagnitude",
            "severity": "warning",
            "stream_name": "weir-east"
        },
        "annotations": {
            "summary": "flow magnitude above threshold",
            "description": "avg magnitude exceeded the configured limit"
        },
        "startsAt": "2026-07-31T08:00:00Z",
        "endsAt": "0001-01-01T00:00:00Z",
        "fingerprint": fingerprint
    });
    json!({
        "receiver": "of-webhook",
        "status": status,
        "groupKey": "{}:{alertname=\"HighMagnitude\"}",
        "alerts": vec![alert; alerts]
    })
}

#[tokio::test]
async fn n_alerts_yield_n_rows_and_one_group_per_identifier() {
    let ctx = SpecCtx::new().await;

    let (status, _) = ctx
        .http("POST", "/alerts/webhook", Some(envelope("firing", "fp-a", 3)))
        .await;
    assert_eq!(status, 204);
    ctx.http("POST", "/alerts/webhook", Some(envelope("firing", "fp-b", 1)))
        .await;

    let (_, events) = ctx.http("GET", "/alerts?limit=50", None).await;
    assert_eq!(events.as_array().unwrap().len(), 4);

    let (_, groups) = ctx.http("GET", "/alerts/groups", None).await;
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 2, "one group per distinct identifier");
    for group in groups {
        assert_eq!(group["alert_name"], "HighMagnitude");
        assert_eq!(group["latest_severity"], "warning");
    }
}

#[tokio::test]
async fn manual_resolve_is_overridden_by_a_newer_firing_event() {
    let ctx = SpecCtx::new().await;

    ctx.http("POST", "/alerts/webhook", Some(envelope("firing", "F1", 1)))
        .await;
    let (_, groups) = ctx.http("GET", "/alerts/groups", None).await;
    assert_eq!(groups[0]["status"], "firing");

    let (status, _) = ctx
        .http(
            "POST",
            "/alerts/group-states",
            Some(json!({"identifier": "F1", "resolved": true})),
        )
        .await;
    assert_eq!(status, 200);
    let (_, groups) = ctx.http("GET", "/alerts/groups", None).await;
    assert_eq!(groups[0]["status"], "resolved");

    // the same fingerprint fires again, later than the manual resolve
    ctx.http("POST", "/alerts/webhook", Some(envelope("firing", "F1", 1)))
        .await;
    let (_, groups) = ctx.http("GET", "/alerts/groups", None).await;
    assert_eq!(groups[0]["status"], "firing");
    assert_eq!(groups[0]["event_count"], 2);

    // the stored override itself is untouched by ingest
    let (_, states) = ctx.http("GET", "/alerts/group-states", None).await;
    assert_eq!(states[0]["identifier"], "F1");
    assert_eq!(states[0]["resolved"], true);
}

#[tokio::test]
async fn fingerprintless_alerts_group_by_composite_identity() {
    let ctx = SpecCtx::new().await;

    ctx.http("POST", "/alerts/webhook", Some(envelope("firing", "", 1)))
        .await;
    ctx.http("POST", "/alerts/webhook", Some(envelope("firing", "", 1)))
        .await;

    let (_, groups) = ctx.http("GET", "/alerts/groups", None).await;
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["identifier"], "HighMagnitude|weir-east|warning");
    assert_eq!(groups[0]["event_count"], 2);
}
