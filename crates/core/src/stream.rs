// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream declarations and observed runtime facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::id::StreamId;
use crate::validate::{check_range, check_range_exclusive, ValidationError};

/// Maximum length of the free-text location label.
pub const MAX_LOCATION_LABEL: usize = 512;

/// Last observed relationship between a stream and its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Worker running and publishing frames recently.
    Connected,
    /// Stream not desired active; no worker.
    Inactive,
    /// Worker launched, no frames seen yet (within the grace window).
    Starting,
    /// Worker running but silent past the grace window.
    WorkerDown,
    /// Worker failed to start, exited, or vanished.
    Error,
    /// Never observed.
    #[default]
    Unknown,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Inactive => "inactive",
            Self::Starting => "starting",
            Self::WorkerDown => "worker_down",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(Self::Connected),
            "inactive" => Ok(Self::Inactive),
            "starting" => Ok(Self::Starting),
            "worker_down" => Ok(Self::WorkerDown),
            "error" => Ok(Self::Error),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown connection status: {other}")),
        }
    }
}

/// Declared configuration of a stream — everything the operator writes.
///
/// All fields are defaulted so a declaration may specify only what it
/// cares about; `validate` rejects anything out of range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// RTSP/HTTP video source.
    pub source_url: String,

    // Geometry (camera placement).
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub orientation_deg: f64,
    pub view_angle_deg: f64,
    pub view_distance_m: f64,
    pub tilt_deg: f64,
    pub mount_height_m: f64,
    pub location_label: String,

    // Processing tuning.
    pub grid_size: u32,
    pub window_radius: u32,
    pub magnitude_threshold: f64,

    // Rendering tuning.
    pub arrow_scale: f64,
    pub arrow_opacity_pct: f64,
    pub gradient_intensity: f64,
    pub ruler_opacity_pct: f64,
    pub show_raw_feed: bool,
    pub show_arrows: bool,
    pub show_magnitude: bool,
    pub show_trails: bool,
    pub show_ruler: bool,

    /// Desired state: whether a worker should exist for this stream.
    pub is_active: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            latitude: None,
            longitude: None,
            orientation_deg: 0.0,
            view_angle_deg: 60.0,
            view_distance_m: 200.0,
            tilt_deg: 30.0,
            mount_height_m: 5.0,
            location_label: String::new(),
            grid_size: 16,
            window_radius: 7,
            magnitude_threshold: 2.0,
            arrow_scale: 1.0,
            arrow_opacity_pct: 80.0,
            gradient_intensity: 1.0,
            ruler_opacity_pct: 60.0,
            show_raw_feed: true,
            show_arrows: true,
            show_magnitude: false,
            show_trails: false,
            show_ruler: false,
            is_active: false,
        }
    }
}

impl StreamConfig {
    /// Validate every declared field against its documented range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_url.trim().is_empty() {
            return Err(ValidationError::new("source_url", "must not be empty"));
        }
        if !self.source_url.contains("://") {
            return Err(ValidationError::new(
                "source_url",
                format!("{:?} is not a URL", self.source_url),
            ));
        }
        if let Some(lat) = self.latitude {
            check_range("latitude", lat, -90.0, 90.0)?;
        }
        if let Some(lon) = self.longitude {
            check_range("longitude", lon, -180.0, 180.0)?;
        }
        check_range_exclusive("orientation_deg", self.orientation_deg, 0.0, 360.0)?;
        check_range("view_angle_deg", self.view_angle_deg, 5.0, 170.0)?;
        check_range("view_distance_m", self.view_distance_m, 50.0, 1000.0)?;
        check_range("tilt_deg", self.tilt_deg, -45.0, 89.0)?;
        check_range("mount_height_m", self.mount_height_m, 0.5, 120.0)?;
        if self.location_label.len() > MAX_LOCATION_LABEL {
            return Err(ValidationError::new(
                "location_label",
                format!("longer than {MAX_LOCATION_LABEL} characters"),
            ));
        }
        check_range("grid_size", self.grid_size, 4, 128)?;
        check_range("window_radius", self.window_radius, 2, 32)?;
        check_range("magnitude_threshold", self.magnitude_threshold, 0.0, 100.0)?;
        check_range("arrow_opacity_pct", self.arrow_opacity_pct, 0.0, 100.0)?;
        check_range("ruler_opacity_pct", self.ruler_opacity_pct, 0.0, 100.0)?;
        Ok(())
    }
}

/// Runtime facts written exclusively by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeFacts {
    pub worker_handle: Option<String>,
    pub worker_started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub connection_status: ConnectionStatus,
    /// Fingerprint of the config the running worker was launched with.
    pub config_fingerprint: Option<String>,
}

/// A stream record: declared configuration plus observed runtime facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    #[serde(flatten)]
    pub config: StreamConfig,
    pub worker_handle: Option<String>,
    pub worker_started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub connection_status: ConnectionStatus,
    /// Internal: fingerprint the live worker was started with.
    #[serde(skip)]
    pub config_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Stream {
    /// Build a fresh record from a validated declaration.
    pub fn from_config(config: StreamConfig) -> Self {
        Self {
            id: StreamId::new(),
            config,
            worker_handle: None,
            worker_started_at: None,
            last_error: None,
            connection_status: ConnectionStatus::Unknown,
            config_fingerprint: None,
            created_at: Utc::now(),
        }
    }

    pub fn facts(&self) -> RuntimeFacts {
        RuntimeFacts {
            worker_handle: self.worker_handle.clone(),
            worker_started_at: self.worker_started_at,
            last_error: self.last_error.clone(),
            connection_status: self.connection_status,
            config_fingerprint: self.config_fingerprint.clone(),
        }
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
