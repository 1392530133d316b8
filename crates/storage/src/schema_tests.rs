// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use sqlx::Row;

use crate::store::Store;

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let store = Store::open_in_memory().await.unwrap();
    // second and third run must be no-ops, not errors
    store.bootstrap().await.unwrap();
    store.bootstrap().await.unwrap();
}

#[tokio::test]
async fn later_columns_are_added_to_an_old_schema() {
    // Simulate a database created before the ruler/fingerprint columns
    // existed: bootstrap, drop the columns, bootstrap again.
    let store = Store::open_in_memory().await.unwrap();
    for column in ["ruler_opacity_pct", "show_ruler", "config_fingerprint"] {
        sqlx::query(&format!("ALTER TABLE streams DROP COLUMN {column}"))
            .execute(&store.pool)
            .await
            .unwrap();
    }

    store.bootstrap().await.unwrap();

    let rows = sqlx::query("PRAGMA table_info(streams)")
        .fetch_all(&store.pool)
        .await
        .unwrap();
    let names: Vec<String> = rows
        .iter()
        .map(|r| r.try_get::<String, _>("name").unwrap())
        .collect();
    assert!(names.contains(&"ruler_opacity_pct".to_string()));
    assert!(names.contains(&"show_ruler".to_string()));
    assert!(names.contains(&"config_fingerprint".to_string()));
}

#[tokio::test]
async fn settings_row_is_backfilled_once() {
    let store = Store::open_in_memory().await.unwrap();
    let first = store.get_settings().await.unwrap();

    // mutate, re-bootstrap: the row must survive
    let mut update = of_core::SettingsUpdate::from(&first);
    update.live_preview_fps = 3.0;
    store.update_settings(&update).await.unwrap();
    store.bootstrap().await.unwrap();

    let settings = store.get_settings().await.unwrap();
    assert_eq!(settings.live_preview_fps, 3.0);
}
