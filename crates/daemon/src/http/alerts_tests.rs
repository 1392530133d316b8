// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use serde_json::json;

use crate::http::test_fixtures::{send, test_ctx};

fn envelope(status: &str, fingerprint: &str) -> serde_json::Value {
    json!({
        "receiver": "of-webhook",
        "status": status,
        "groupKey": "{}:{alertname=\"NoFrames\"}",
        "alerts": [{
            "status": status,
            "labels": {
                "alertname": "NoFrames",
                "severity": "critical",
                "stream_name": "bridge-north"
            },
            "annotations": {"summary": "stream went silent"},
            "startsAt": "2026-07-30T10:00:00Z",
            "fingerprint": fingerprint
        }]
    })
}

#[tokio::test]
async fn webhook_stores_one_event_per_alert() {
    let ctx = test_ctx().await;
    let mut body = envelope("firing", "f1");
    let alert = body["alerts"][0].clone();
    body["alerts"].as_array_mut().unwrap().push(alert);

    let (status, _) = send(&ctx.state, "POST", "/alerts/webhook", Some(body)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, events) = send(&ctx.state, "GET", "/alerts?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["alert_name"], "NoFrames");
    assert_eq!(events[0]["raw"]["receiver"], "of-webhook");
}

#[tokio::test]
async fn unrecognized_envelope_is_accepted_without_events() {
    let ctx = test_ctx().await;
    let (status, _) = send(
        &ctx.state,
        "POST",
        "/alerts/webhook",
        Some(json!({"hello": "world"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, events) = send(&ctx.state, "GET", "/alerts", None).await;
    assert!(events.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_respects_the_limit_parameter() {
    let ctx = test_ctx().await;
    for fp in ["a", "b", "c"] {
        send(&ctx.state, "POST", "/alerts/webhook", Some(envelope("firing", fp))).await;
    }

    let (_, events) = send(&ctx.state, "GET", "/alerts?limit=2", None).await;
    assert_eq!(events.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn group_state_round_trip() {
    let ctx = test_ctx().await;
    let (status, stored) = send(
        &ctx.state,
        "POST",
        "/alerts/group-states",
        Some(json!({"identifier": "f1", "resolved": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["resolved"], true);

    let (_, states) = send(&ctx.state, "GET", "/alerts/group-states", None).await;
    let states = states.as_array().unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0]["identifier"], "f1");
}

#[tokio::test]
async fn empty_identifier_is_rejected() {
    let ctx = test_ctx().await;
    let (status, body) = send(
        &ctx.state,
        "POST",
        "/alerts/group-states",
        Some(json!({"identifier": "", "resolved": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("identifier"));
}

#[tokio::test]
async fn manual_resolution_holds_until_a_newer_firing_event() {
    let ctx = test_ctx().await;

    // firing alert appears in the group view
    send(&ctx.state, "POST", "/alerts/webhook", Some(envelope("firing", "f1"))).await;
    let (_, groups) = send(&ctx.state, "GET", "/alerts/groups", None).await;
    assert_eq!(groups[0]["identifier"], "f1");
    assert_eq!(groups[0]["status"], "firing");
    assert_eq!(groups[0]["latest_severity"], "critical");

    // operator resolves it manually
    send(
        &ctx.state,
        "POST",
        "/alerts/group-states",
        Some(json!({"identifier": "f1", "resolved": true})),
    )
    .await;
    let (_, groups) = send(&ctx.state, "GET", "/alerts/groups", None).await;
    assert_eq!(groups[0]["status"], "resolved");
    assert_eq!(groups[0]["resolved"], true);

    // a newer firing event re-opens the group
    send(&ctx.state, "POST", "/alerts/webhook", Some(envelope("firing", "f1"))).await;
    let (_, groups) = send(&ctx.state, "GET", "/alerts/groups", None).await;
    assert_eq!(groups[0]["status"], "firing");
    assert_eq!(groups[0]["resolved"], false);
    assert_eq!(groups[0]["event_count"], 2);
}

#[tokio::test]
async fn groups_aggregate_by_identifier() {
    let ctx = test_ctx().await;
    send(&ctx.state, "POST", "/alerts/webhook", Some(envelope("firing", "f1"))).await;
    send(&ctx.state, "POST", "/alerts/webhook", Some(envelope("resolved", "f1"))).await;
    send(&ctx.state, "POST", "/alerts/webhook", Some(envelope("firing", "f2"))).await;

    let (_, groups) = send(&ctx.state, "GET", "/alerts/groups", None).await;
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 2);

    let f1 = groups.iter().find(|g| g["identifier"] == "f1").unwrap();
    assert_eq!(f1["event_count"], 2);
    assert_eq!(f1["status"], "resolved", "latest event wins");
}
