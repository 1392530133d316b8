// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core domain types for the optical-flow fleet manager.
//!
//! Pure data: stream declarations and runtime facts, global settings,
//! frame messages, alert events, validation, and the config fingerprint.
//! No I/O lives here — storage, runtimes, and transport build on these
//! types from the outer crates.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod alert;
pub mod fingerprint;
pub mod frame;
mod id;
pub mod settings;
pub mod stream;
mod validate;

pub use alert::{
    derive_groups, events_from_envelope, normalize_severity, AlertEvent, AlertGroup,
    AlertGroupState, NewAlertEvent,
};
pub use fingerprint::config_fingerprint;
pub use frame::{frame_channel, parse_frame_channel, FrameMessage, FRAME_CHANNEL_PATTERN};
pub use id::{StreamId, WorkerHandle};
pub use settings::{SettingsUpdate, SystemSettings};
pub use stream::{ConnectionStatus, RuntimeFacts, Stream, StreamConfig};
pub use validate::ValidationError;
