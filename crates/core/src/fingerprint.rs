// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config fingerprint: a stable hash of the worker-observable subset
//! of a stream's configuration.
//!
//! The reconciler compares fingerprints to decide whether a running
//! worker already matches the saved config or must be restarted. The
//! hash covers every field a worker reads at startup — source, tuning,
//! geometry, overlay toggles, and the preview settings snapshot — and
//! nothing else, so cosmetic edits never restart workers.

use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::settings::SystemSettings;
use crate::stream::StreamConfig;

/// Hash the worker-observable tuple. Field order is fixed; changing it
/// changes every fingerprint and restarts the whole fleet on upgrade.
pub fn config_fingerprint(config: &StreamConfig, settings: &SystemSettings) -> String {
    let mut canonical = String::new();
    let c = config;
    // write! to a String cannot fail
    let _ = write!(
        canonical,
        "src={}\x1flat={:?}\x1flon={:?}\x1forient={}\x1fangle={}\x1fdist={}\x1ftilt={}\x1fheight={}\x1f",
        c.source_url,
        c.latitude,
        c.longitude,
        c.orientation_deg,
        c.view_angle_deg,
        c.view_distance_m,
        c.tilt_deg,
        c.mount_height_m,
    );
    let _ = write!(
        canonical,
        "grid={}\x1fwin={}\x1fmag={}\x1f",
        c.grid_size, c.window_radius, c.magnitude_threshold,
    );
    let _ = write!(
        canonical,
        "arrow={}\x1faop={}\x1fgrad={}\x1frop={}\x1fraw={}\x1farrows={}\x1fmagov={}\x1ftrails={}\x1fruler={}\x1f",
        c.arrow_scale,
        c.arrow_opacity_pct,
        c.gradient_intensity,
        c.ruler_opacity_pct,
        c.show_raw_feed,
        c.show_arrows,
        c.show_magnitude,
        c.show_trails,
        c.show_ruler,
    );
    let _ = write!(
        canonical,
        "fps={}\x1fjpeg={}\x1fwidth={}",
        settings.live_preview_fps,
        settings.live_preview_jpeg_quality,
        settings.live_preview_max_width,
    );
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
