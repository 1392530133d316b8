// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker runtime drivers.
//!
//! A driver owns worker lifecycle against one external runtime. Two
//! variants ship: [`DockerRuntime`] (container daemon) and
//! [`KubernetesRuntime`] (one single-replica deployment per worker).
//! Both are idempotent: `start` on a live handle returns it, `stop` on
//! a missing handle succeeds.

mod docker;
#[cfg(any(test, feature = "test-support"))]
mod fake;
mod kube;

pub use docker::DockerRuntime;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRuntime;
pub use kube::KubernetesRuntime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use of_core::{frame_channel, Stream, StreamId, SystemSettings, WorkerHandle};

/// A driver call failed. `retryable` tells the reconciler whether the
/// next iteration should try again or wait for operator action.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub retryable: bool,
    pub message: String,
}

impl RuntimeError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { retryable: true, message: message.into() }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self { retryable: false, message: message.into() }
    }
}

/// Coarse worker state, normalized across runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Starting,
    Exited,
    Missing,
}

/// Snapshot returned by `inspect`.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Shared-infrastructure endpoints handed to every worker.
#[derive(Debug, Clone)]
pub struct InfraEndpoints {
    pub redis_url: String,
    pub database_url: String,
    pub metrics_url: Option<String>,
}

/// Everything a driver needs to launch one worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub stream_id: StreamId,
    pub handle: WorkerHandle,
    pub image: String,
    pub env: Vec<(String, String)>,
}

impl WorkerSpec {
    /// Assemble the worker environment: the full stream config, the
    /// preview settings snapshot, and infrastructure endpoints. The
    /// fingerprint rides along so tests can read back what config a
    /// live worker was launched with.
    pub fn for_stream(
        stream: &Stream,
        settings: &SystemSettings,
        infra: &InfraEndpoints,
        image: &str,
        fingerprint: &str,
    ) -> Self {
        let c = &stream.config;
        let mut env: Vec<(String, String)> = vec![
            ("OF_STREAM_ID".into(), stream.id.to_string()),
            ("OF_SOURCE_URL".into(), c.source_url.clone()),
            ("OF_FRAME_CHANNEL".into(), frame_channel(&stream.id)),
            ("OF_GRID_SIZE".into(), c.grid_size.to_string()),
            ("OF_WINDOW_RADIUS".into(), c.window_radius.to_string()),
            ("OF_MAGNITUDE_THRESHOLD".into(), c.magnitude_threshold.to_string()),
            ("OF_ORIENTATION_DEG".into(), c.orientation_deg.to_string()),
            ("OF_VIEW_ANGLE_DEG".into(), c.view_angle_deg.to_string()),
            ("OF_VIEW_DISTANCE_M".into(), c.view_distance_m.to_string()),
            ("OF_TILT_DEG".into(), c.tilt_deg.to_string()),
            ("OF_MOUNT_HEIGHT_M".into(), c.mount_height_m.to_string()),
            ("OF_LOCATION_LABEL".into(), c.location_label.clone()),
            ("OF_ARROW_SCALE".into(), c.arrow_scale.to_string()),
            ("OF_ARROW_OPACITY_PCT".into(), c.arrow_opacity_pct.to_string()),
            ("OF_GRADIENT_INTENSITY".into(), c.gradient_intensity.to_string()),
            ("OF_RULER_OPACITY_PCT".into(), c.ruler_opacity_pct.to_string()),
            ("OF_SHOW_RAW_FEED".into(), c.show_raw_feed.to_string()),
            ("OF_SHOW_ARROWS".into(), c.show_arrows.to_string()),
            ("OF_SHOW_MAGNITUDE".into(), c.show_magnitude.to_string()),
            ("OF_SHOW_TRAILS".into(), c.show_trails.to_string()),
            ("OF_SHOW_RULER".into(), c.show_ruler.to_string()),
            ("OF_PREVIEW_FPS".into(), settings.live_preview_fps.to_string()),
            (
                "OF_PREVIEW_JPEG_QUALITY".into(),
                settings.live_preview_jpeg_quality.to_string(),
            ),
            (
                "OF_PREVIEW_MAX_WIDTH".into(),
                settings.live_preview_max_width.to_string(),
            ),
            ("OF_REDIS_URL".into(), infra.redis_url.clone()),
            ("OF_DATABASE_URL".into(), infra.database_url.clone()),
            ("OF_CONFIG_FINGERPRINT".into(), fingerprint.to_string()),
        ];
        if let Some(lat) = c.latitude {
            env.push(("OF_LATITUDE".into(), lat.to_string()));
        }
        if let Some(lon) = c.longitude {
            env.push(("OF_LONGITUDE".into(), lon.to_string()));
        }
        if let Some(ref metrics) = infra.metrics_url {
            env.push(("OF_METRICS_URL".into(), metrics.clone()));
        }

        Self {
            stream_id: stream.id,
            handle: WorkerHandle::for_stream(&stream.id),
            image: image.to_string(),
            env,
        }
    }
}

/// Uniform capability set over worker runtimes.
#[async_trait]
pub trait WorkerRuntime: Send + Sync + 'static {
    /// Launch a worker. Returns the existing handle unchanged if an
    /// equivalent worker is already live.
    async fn start(&self, spec: &WorkerSpec) -> Result<WorkerHandle, RuntimeError>;

    /// Stop and remove a worker. Succeeds if the handle is unknown.
    async fn stop(&self, handle: &WorkerHandle) -> Result<(), RuntimeError>;

    /// Observe the worker's current state.
    async fn inspect(&self, handle: &WorkerHandle) -> Result<WorkerStatus, RuntimeError>;

    /// Last `lines` of the worker's log output.
    async fn tail(&self, handle: &WorkerHandle, lines: usize)
        -> Result<Vec<String>, RuntimeError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
