// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapters over external infrastructure: worker runtimes (container
//! daemon, pod orchestrator) and the frame pub/sub bus.
//!
//! Everything here hides behind a trait so the engine can run against
//! fakes in tests (`test-support` feature).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bus;
pub mod runtime;

pub use bus::{BusError, BusMessage, FrameBus, FrameSubscription, RedisFrameBus};
pub use runtime::{
    DockerRuntime, InfraEndpoints, KubernetesRuntime, RuntimeError, WorkerRuntime, WorkerSpec,
    WorkerState, WorkerStatus,
};

#[cfg(any(test, feature = "test-support"))]
pub use bus::FakeFrameBus;
#[cfg(any(test, feature = "test-support"))]
pub use runtime::FakeRuntime;
