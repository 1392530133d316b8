// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory runtime driver for engine and API tests.
//!
//! Mirrors the idempotence contract of the real drivers and exposes
//! hooks to inject failures, flip worker states, and read back the
//! environment a worker was launched with.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use of_core::WorkerHandle;

use super::{RuntimeError, WorkerRuntime, WorkerSpec, WorkerState, WorkerStatus};

/// One simulated worker.
#[derive(Debug, Clone)]
pub struct FakeWorker {
    pub env: HashMap<String, String>,
    pub state: WorkerState,
    pub started_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub logs: Vec<String>,
    /// Bumped on every fresh creation; a restart is visible as a new
    /// generation under the same handle.
    pub generation: u64,
}

#[derive(Default)]
struct Inner {
    workers: HashMap<String, FakeWorker>,
    starts: Vec<String>,
    stops: Vec<String>,
    fail_next_start: Option<RuntimeError>,
    next_generation: u64,
}

/// Shared-state fake driver. Clones observe the same fleet.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    inner: Arc<Mutex<Inner>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `start` call fail once.
    pub fn fail_next_start(&self, message: &str, retryable: bool) {
        self.inner.lock().fail_next_start = Some(RuntimeError {
            retryable,
            message: message.to_string(),
        });
    }

    /// Flip a live worker's observed state.
    pub fn set_state(&self, handle: &WorkerHandle, state: WorkerState) {
        if let Some(worker) = self.inner.lock().workers.get_mut(handle.as_str()) {
            worker.state = state;
        }
    }

    pub fn set_last_error(&self, handle: &WorkerHandle, error: &str) {
        if let Some(worker) = self.inner.lock().workers.get_mut(handle.as_str()) {
            worker.last_error = Some(error.to_string());
        }
    }

    /// Drop a worker entirely, as if it vanished out from under us.
    pub fn vanish(&self, handle: &WorkerHandle) {
        self.inner.lock().workers.remove(handle.as_str());
    }

    pub fn push_log(&self, handle: &WorkerHandle, line: &str) {
        if let Some(worker) = self.inner.lock().workers.get_mut(handle.as_str()) {
            worker.logs.push(line.to_string());
        }
    }

    /// Test hook: the worker a handle currently refers to.
    pub fn worker(&self, handle: &WorkerHandle) -> Option<FakeWorker> {
        self.inner.lock().workers.get(handle.as_str()).cloned()
    }

    /// Test hook: the env value a live worker was launched with.
    pub fn worker_env(&self, handle: &WorkerHandle, key: &str) -> Option<String> {
        self.inner
            .lock()
            .workers
            .get(handle.as_str())
            .and_then(|w| w.env.get(key).cloned())
    }

    /// Handles created so far, in order (restarts repeat the handle).
    pub fn starts(&self) -> Vec<String> {
        self.inner.lock().starts.clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.inner.lock().stops.clone()
    }

    pub fn start_count(&self) -> usize {
        self.inner.lock().starts.len()
    }

    pub fn stop_count(&self) -> usize {
        self.inner.lock().stops.len()
    }

    pub fn live_handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self.inner.lock().workers.keys().cloned().collect();
        handles.sort();
        handles
    }
}

#[async_trait::async_trait]
impl WorkerRuntime for FakeRuntime {
    async fn start(&self, spec: &WorkerSpec) -> Result<WorkerHandle, RuntimeError> {
        let mut inner = self.inner.lock();
        if let Some(err) = inner.fail_next_start.take() {
            return Err(err);
        }

        if let Some(existing) = inner.workers.get(spec.handle.as_str()) {
            if matches!(existing.state, WorkerState::Running | WorkerState::Starting) {
                return Ok(spec.handle.clone());
            }
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.workers.insert(
            spec.handle.to_string(),
            FakeWorker {
                env: spec.env.iter().cloned().collect(),
                state: WorkerState::Running,
                started_at: Utc::now(),
                last_error: None,
                logs: Vec::new(),
                generation,
            },
        );
        inner.starts.push(spec.handle.to_string());
        Ok(spec.handle.clone())
    }

    async fn stop(&self, handle: &WorkerHandle) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock();
        inner.stops.push(handle.to_string());
        inner.workers.remove(handle.as_str());
        Ok(())
    }

    async fn inspect(&self, handle: &WorkerHandle) -> Result<WorkerStatus, RuntimeError> {
        match self.inner.lock().workers.get(handle.as_str()) {
            Some(worker) => Ok(WorkerStatus {
                state: worker.state,
                started_at: Some(worker.started_at),
                last_error: worker.last_error.clone(),
            }),
            None => Ok(WorkerStatus {
                state: WorkerState::Missing,
                started_at: None,
                last_error: None,
            }),
        }
    }

    async fn tail(
        &self,
        handle: &WorkerHandle,
        lines: usize,
    ) -> Result<Vec<String>, RuntimeError> {
        match self.inner.lock().workers.get(handle.as_str()) {
            Some(worker) => {
                let skip = worker.logs.len().saturating_sub(lines);
                Ok(worker.logs[skip..].to_vec())
            }
            None => Err(RuntimeError::transient(format!("no worker {handle}"))),
        }
    }
}
