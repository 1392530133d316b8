// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::settings::SystemSettings;
use crate::stream::StreamConfig;

fn config() -> StreamConfig {
    StreamConfig {
        source_url: "rtsp://cam/1".to_string(),
        ..Default::default()
    }
}

#[test]
fn identical_inputs_hash_identically() {
    let settings = SystemSettings::default();
    assert_eq!(
        config_fingerprint(&config(), &settings),
        config_fingerprint(&config(), &settings)
    );
}

#[test]
fn worker_observable_fields_change_the_fingerprint() {
    let settings = SystemSettings::default();
    let base = config_fingerprint(&config(), &settings);

    let changed = StreamConfig { grid_size: 32, ..config() };
    assert_ne!(config_fingerprint(&changed, &settings), base);

    let changed = StreamConfig { show_trails: true, ..config() };
    assert_ne!(config_fingerprint(&changed, &settings), base);

    let changed = StreamConfig {
        source_url: "rtsp://cam/2".to_string(),
        ..config()
    };
    assert_ne!(config_fingerprint(&changed, &settings), base);
}

#[test]
fn preview_settings_are_part_of_the_fingerprint() {
    let base = config_fingerprint(&config(), &SystemSettings::default());
    let settings = SystemSettings {
        live_preview_fps: 2.0,
        ..SystemSettings::default()
    };
    assert_ne!(config_fingerprint(&config(), &settings), base);
}

#[test]
fn cosmetic_fields_do_not_restart_workers() {
    // is_active and orientation_offset are not worker-observable
    let settings = SystemSettings::default();
    let base = config_fingerprint(&config(), &settings);

    let active = StreamConfig { is_active: true, ..config() };
    assert_eq!(config_fingerprint(&active, &settings), base);

    let offset = SystemSettings {
        orientation_offset_deg: 90.0,
        ..SystemSettings::default()
    };
    assert_eq!(config_fingerprint(&config(), &offset), base);
}

#[test]
fn updated_at_is_not_hashed() {
    let mut settings = SystemSettings::default();
    let base = config_fingerprint(&config(), &settings);
    settings.updated_at = chrono::Utc::now();
    assert_eq!(config_fingerprint(&config(), &settings), base);
}
