// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use of_core::{SettingsUpdate, SystemSettings};

use crate::error::StoreError;
use crate::store::Store;

#[tokio::test]
async fn fresh_database_serves_defaults() {
    let store = Store::open_in_memory().await.unwrap();
    let settings = store.get_settings().await.unwrap();
    let defaults = SystemSettings::default();
    assert_eq!(settings.live_preview_fps, defaults.live_preview_fps);
    assert_eq!(
        settings.live_preview_jpeg_quality,
        defaults.live_preview_jpeg_quality
    );
}

#[tokio::test]
async fn update_persists_and_stamps_updated_at() {
    let store = Store::open_in_memory().await.unwrap();
    let before = store.get_settings().await.unwrap();

    let update = SettingsUpdate {
        live_preview_fps: 2.0,
        live_preview_jpeg_quality: 85,
        live_preview_max_width: 0,
        orientation_offset_deg: -15.0,
    };
    let stored = store.update_settings(&update).await.unwrap();
    assert_eq!(stored.live_preview_fps, 2.0);
    assert!(stored.updated_at >= before.updated_at);

    let read = store.get_settings().await.unwrap();
    assert_eq!(read.live_preview_fps, 2.0);
    assert_eq!(read.live_preview_max_width, 0);
    assert_eq!(read.orientation_offset_deg, -15.0);
}

#[tokio::test]
async fn invalid_update_is_rejected_and_nothing_changes() {
    let store = Store::open_in_memory().await.unwrap();
    let before = store.get_settings().await.unwrap();

    let err = store
        .update_settings(&SettingsUpdate {
            live_preview_fps: 99.0,
            ..SettingsUpdate::from(&before)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(
        store.get_settings().await.unwrap().live_preview_fps,
        before.live_preview_fps
    );
}
