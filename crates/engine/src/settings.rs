// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings manager: persistence plus change cascades.
//!
//! The broker watches the FPS cap through a watch channel so throttle
//! changes take effect on the next frame. An explicit
//! `restart_workers` request additionally walks the active fleet
//! serially; per-stream failures are collected, never rolled back.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use of_core::{SettingsUpdate, StreamId, SystemSettings};
use of_storage::{Store, StoreError};

use crate::reconciler::Reconciler;

/// One stream that failed to restart during a settings cascade.
#[derive(Debug, Clone, Serialize)]
pub struct RestartFailure {
    pub stream_id: StreamId,
    pub error: String,
}

/// Result of a settings update.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsOutcome {
    pub settings: SystemSettings,
    pub restart_errors: Vec<RestartFailure>,
}

/// Owns the singleton settings row and its change notifications.
pub struct SettingsManager {
    store: Store,
    reconciler: Arc<Reconciler>,
    fps_tx: watch::Sender<f64>,
}

impl SettingsManager {
    /// Build the manager and the FPS watch channel seeded with the
    /// currently-persisted cap.
    pub fn new(store: Store, reconciler: Arc<Reconciler>, initial_fps: f64) -> Self {
        let (fps_tx, _) = watch::channel(initial_fps);
        Self { store, reconciler, fps_tx }
    }

    /// Receiver for the live FPS cap, consumed by the broker.
    pub fn fps_watch(&self) -> watch::Receiver<f64> {
        self.fps_tx.subscribe()
    }

    pub async fn current(&self) -> Result<SystemSettings, StoreError> {
        self.store.get_settings().await
    }

    /// Persist the update and cascade.
    ///
    /// With `restart_workers`, every active stream is reactivated in
    /// turn so workers relaunch with the new preview parameters. The
    /// walk is serial to bound load on the external runtime, continues
    /// past failures, and reports them per stream.
    pub async fn update(
        &self,
        update: SettingsUpdate,
        restart_workers: bool,
    ) -> Result<SettingsOutcome, StoreError> {
        let settings = self.store.update_settings(&update).await?;
        let _ = self.fps_tx.send(settings.live_preview_fps);
        info!(
            fps = settings.live_preview_fps,
            jpeg_quality = settings.live_preview_jpeg_quality,
            restart_workers,
            "settings updated"
        );

        let mut restart_errors = Vec::new();
        if restart_workers {
            for stream in self.store.list_active_streams().await? {
                if let Err(e) = self.reconciler.activate(&stream.id).await {
                    warn!(stream = %stream.id, error = %e, "settings restart failed");
                    restart_errors.push(RestartFailure {
                        stream_id: stream.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(SettingsOutcome { settings, restart_errors })
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
