// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet manager daemon: control API plus process lifecycle.
//!
//! Wires the store, runtime driver, frame bus, and engine together,
//! serves the HTTP/WebSocket surface, and owns the shutdown signal.
//! The assembly entry points are public so integration tests can run
//! the whole daemon against fakes.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod http;
pub mod lifecycle;
pub mod metrics;

pub use http::{router, AppState};
pub use lifecycle::{build_state, Deps, DaemonError};
