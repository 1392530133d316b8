// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet engine: reconciliation, frame brokering, and fan-out.
//!
//! The engine owns every long-lived loop between the store and the
//! outside world: the reconciler converges declared stream state onto
//! the worker runtime, the broker pulls frames off the pub/sub bus and
//! throttles them, and the subscription hub fans surviving frames out
//! to bounded per-client queues. All loops are cancelled through one
//! shutdown token owned by the daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod broker;
mod hub;
mod locks;
mod metrics;
mod recency;
mod reconciler;
mod settings;

pub use broker::{BrokerConfig, FrameBroker};
pub use hub::{FrameSubscriber, SubscriptionHub};
pub use locks::StreamLocks;
pub use metrics::EngineMetrics;
pub use reconciler::{ReconcileError, Reconciler, ReconcilerConfig};
pub use recency::FrameRecency;
pub use settings::{RestartFailure, SettingsManager, SettingsOutcome};
