// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end scenarios: the whole daemon assembled
//! against a fake runtime and fake frame bus, driven over its real
//! API surface.

mod support;

#[path = "specs/alerts.rs"]
mod alerts;
#[path = "specs/frames.rs"]
mod frames;
#[path = "specs/streams.rs"]
mod streams;
