// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Singleton global settings (preview throttling, cosmetic offsets).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validate::{check_range, ValidationError};

/// Process-wide settings, persisted as a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Publish cap for live preview frames, per stream.
    pub live_preview_fps: f64,
    /// JPEG quality workers encode previews with.
    pub live_preview_jpeg_quality: u8,
    /// Preview resize cap in pixels; 0 disables resizing.
    pub live_preview_max_width: u32,
    /// Cosmetic rotation applied by the UI only.
    pub orientation_offset_deg: f64,
    pub updated_at: DateTime<Utc>,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            live_preview_fps: 5.0,
            live_preview_jpeg_quality: 70,
            live_preview_max_width: 960,
            orientation_offset_deg: 0.0,
            updated_at: Utc::now(),
        }
    }
}

/// A requested settings change. Applied as a full replacement of the
/// mutable fields after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub live_preview_fps: f64,
    pub live_preview_jpeg_quality: u8,
    pub live_preview_max_width: u32,
    pub orientation_offset_deg: f64,
}

impl SettingsUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("live_preview_fps", self.live_preview_fps, 0.5, 30.0)?;
        check_range(
            "live_preview_jpeg_quality",
            self.live_preview_jpeg_quality,
            30,
            95,
        )?;
        check_range(
            "orientation_offset_deg",
            self.orientation_offset_deg,
            -360.0,
            360.0,
        )?;
        Ok(())
    }

    pub fn apply_to(&self, settings: &SystemSettings) -> SystemSettings {
        SystemSettings {
            live_preview_fps: self.live_preview_fps,
            live_preview_jpeg_quality: self.live_preview_jpeg_quality,
            live_preview_max_width: self.live_preview_max_width,
            orientation_offset_deg: self.orientation_offset_deg,
            updated_at: Utc::now(),
        }
    }
}

impl From<&SystemSettings> for SettingsUpdate {
    fn from(s: &SystemSettings) -> Self {
        Self {
            live_preview_fps: s.live_preview_fps,
            live_preview_jpeg_quality: s.live_preview_jpeg_quality,
            live_preview_max_width: s.live_preview_max_width,
            orientation_offset_deg: s.orientation_offset_deg,
        }
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
