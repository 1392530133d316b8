// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciler: declared state → worker lifecycle.
//!
//! Every transition runs under the stream's serialization lock and
//! holds it across the store write and the driver call. Driver calls
//! carry deadlines so a wedged runtime cannot pin a lock; on deadline
//! the call counts as an error and the next sweep retries.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use of_adapters::{
    InfraEndpoints, RuntimeError, WorkerRuntime, WorkerSpec, WorkerState, WorkerStatus,
};
use of_core::{
    config_fingerprint, ConnectionStatus, RuntimeFacts, Stream, StreamConfig, StreamId,
    WorkerHandle,
};
use of_storage::{Store, StoreError, StreamUpdate};

use crate::locks::StreamLocks;
use crate::metrics::EngineMetrics;
use crate::recency::FrameRecency;

/// Reconciler tuning. Defaults match the documented intervals.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Periodic sweep interval.
    pub interval: Duration,
    pub start_deadline: Duration,
    pub stop_deadline: Duration,
    pub inspect_deadline: Duration,
    /// A frame younger than this means `connected`.
    pub stale_after: Duration,
    /// A silent worker younger than this is still `starting`.
    pub start_grace: Duration,
    /// Automatic restarts allowed per stream per minute.
    pub max_restarts_per_minute: usize,
    /// Log lines captured into `last_error` when a worker exits.
    pub log_tail_lines: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            start_deadline: Duration::from_secs(30),
            stop_deadline: Duration::from_secs(15),
            inspect_deadline: Duration::from_secs(5),
            stale_after: Duration::from_secs(15),
            start_grace: Duration::from_secs(30),
            max_restarts_per_minute: 3,
            log_tail_lines: 20,
        }
    }
}

/// Errors surfaced to API callers from reconcile transitions.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("runtime: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Converges each stream's worker onto its saved configuration.
pub struct Reconciler {
    store: Store,
    runtime: Arc<dyn WorkerRuntime>,
    locks: StreamLocks,
    recency: Arc<FrameRecency>,
    infra: InfraEndpoints,
    image: String,
    config: ReconcilerConfig,
    metrics: Arc<EngineMetrics>,
    restarts: Mutex<HashMap<StreamId, VecDeque<Instant>>>,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        runtime: Arc<dyn WorkerRuntime>,
        locks: StreamLocks,
        recency: Arc<FrameRecency>,
        infra: InfraEndpoints,
        image: String,
        config: ReconcilerConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            store,
            runtime,
            locks,
            recency,
            infra,
            image,
            config,
            metrics,
            restarts: Mutex::new(HashMap::new()),
        }
    }

    pub fn locks(&self) -> &StreamLocks {
        &self.locks
    }

    /// Mark the stream desired-active and ensure a worker exists with
    /// the currently-saved config.
    ///
    /// The desired-state write and the driver action share the
    /// stream's lock, so concurrent transitions reach the runtime in
    /// submission order. No-op when a live worker already matches the
    /// fingerprint; a mismatch restarts the worker. Explicit
    /// activation resets the stream's restart budget.
    pub async fn activate(&self, id: &StreamId) -> Result<Stream, ReconcileError> {
        let _guard = self.locks.acquire(id).await;
        self.restarts.lock().remove(id);
        self.store.set_active(id, true).await?;
        self.activate_locked(id).await
    }

    /// Mark the stream desired-inactive, stop the worker
    /// (best-effort), and clear the handle.
    pub async fn deactivate(&self, id: &StreamId) -> Result<Stream, ReconcileError> {
        let _guard = self.locks.acquire(id).await;
        self.restarts.lock().remove(id);
        self.store.set_active(id, false).await?;
        self.deactivate_locked(id).await
    }

    /// Replace the stream's declared config and converge on it:
    /// restart on fingerprint change while active, activate or
    /// deactivate on `is_active` flips. The store write and the worker
    /// transition happen under the stream's lock.
    pub async fn apply_config_change(
        &self,
        id: &StreamId,
        config: StreamConfig,
    ) -> Result<StreamUpdate, ReconcileError> {
        let _guard = self.locks.acquire(id).await;
        let mut update = self.store.update_stream(id, config).await?;
        if update.before.config.is_active && !update.after.config.is_active {
            self.restarts.lock().remove(id);
            update.after = self.deactivate_locked(id).await?;
        } else if update.after.config.is_active {
            // activate_locked no-ops when the fingerprint is unchanged
            self.restarts.lock().remove(id);
            update.after = self.activate_locked(id).await?;
        }
        Ok(update)
    }

    /// Delete the stream record. Refused while desired active; a stale
    /// attached worker is stopped first. The lock entry is retained
    /// for the record's lifetime and dropped here with it.
    pub async fn delete(&self, id: &StreamId) -> Result<(), ReconcileError> {
        let guard = self.locks.acquire(id).await;
        let stream = self.store.get_stream(id).await?;
        if stream.config.is_active {
            return Err(StoreError::Conflict(format!(
                "stream {id} is active; deactivate it first"
            ))
            .into());
        }
        if stream.worker_handle.is_some() {
            self.deactivate_locked(id).await?;
        }
        self.store.delete_stream(id).await?;
        self.restarts.lock().remove(id);
        drop(guard);
        self.locks.forget(id);
        Ok(())
    }

    /// One sweep over every stream: refresh observed status and
    /// converge desired ≠ observed. Streams busy under an API-driven
    /// transition are skipped until the next sweep.
    pub async fn reconcile_all(&self, shutdown: &CancellationToken) -> Result<(), ReconcileError> {
        let streams = self.store.list_streams().await?;
        for stream in streams {
            // finish in-flight transitions on shutdown, start no new ones
            if shutdown.is_cancelled() {
                return Ok(());
            }
            let Some(_guard) = self.locks.try_acquire(&stream.id) else {
                continue;
            };
            if let Err(e) = self.refresh_locked(&stream.id).await {
                warn!(stream = %stream.id, error = %e, "refresh failed");
            }
        }
        self.metrics.reconcile_passes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Periodic reconciliation loop.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("reconciler stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.reconcile_all(&shutdown).await {
                warn!(error = %e, "reconcile sweep failed");
            }
        }
    }

    async fn activate_locked(&self, id: &StreamId) -> Result<Stream, ReconcileError> {
        let stream = self.store.get_stream(id).await?;
        let settings = self.store.get_settings().await?;
        let fingerprint = config_fingerprint(&stream.config, &settings);

        if let Some(ref handle) = stream.worker_handle {
            let handle = WorkerHandle::new(handle.clone());
            if stream.config_fingerprint.as_deref() == Some(fingerprint.as_str()) {
                if let Ok(status) = self.inspect_worker(&handle).await {
                    if matches!(status.state, WorkerState::Running | WorkerState::Starting) {
                        debug!(stream = %id, "activate: worker already matches config");
                        return Ok(stream);
                    }
                }
            }
            // config drifted or worker is gone: replace it
            self.stop_worker(&handle).await;
            self.metrics.worker_restarts.fetch_add(1, Ordering::Relaxed);
        }

        let spec = WorkerSpec::for_stream(&stream, &settings, &self.infra, &self.image, &fingerprint);
        match self.start_worker(&spec).await {
            Ok(handle) => {
                let facts = RuntimeFacts {
                    worker_handle: Some(handle.to_string()),
                    worker_started_at: Some(Utc::now()),
                    last_error: None,
                    connection_status: ConnectionStatus::Starting,
                    config_fingerprint: Some(fingerprint),
                };
                self.store.set_runtime_facts(id, &facts).await?;
                self.recency.clear(id);
                info!(stream = %id, handle = %handle, "worker activated");
                self.store.get_stream(id).await.map_err(Into::into)
            }
            Err(e) => {
                let facts = RuntimeFacts {
                    worker_handle: None,
                    worker_started_at: None,
                    last_error: Some(e.to_string()),
                    connection_status: ConnectionStatus::Error,
                    config_fingerprint: None,
                };
                self.store.set_runtime_facts(id, &facts).await?;
                warn!(stream = %id, error = %e, "worker start failed");
                Err(e.into())
            }
        }
    }

    async fn deactivate_locked(&self, id: &StreamId) -> Result<Stream, ReconcileError> {
        let stream = self.store.get_stream(id).await?;
        if let Some(ref handle) = stream.worker_handle {
            self.stop_worker(&WorkerHandle::new(handle.clone())).await;
        }
        let facts = RuntimeFacts {
            worker_handle: None,
            worker_started_at: None,
            last_error: None,
            connection_status: ConnectionStatus::Inactive,
            config_fingerprint: None,
        };
        self.store.set_runtime_facts(id, &facts).await?;
        self.recency.clear(id);
        info!(stream = %id, "worker deactivated");
        self.store.get_stream(id).await.map_err(Into::into)
    }

    /// Refresh one stream's observed status and converge it. Caller
    /// holds the stream lock.
    async fn refresh_locked(&self, id: &StreamId) -> Result<(), ReconcileError> {
        let stream = self.store.get_stream(id).await?;

        if !stream.config.is_active {
            if stream.worker_handle.is_some() {
                // worker attached but no longer desired
                self.deactivate_locked(id).await?;
            } else if stream.connection_status != ConnectionStatus::Inactive {
                let facts = RuntimeFacts {
                    connection_status: ConnectionStatus::Inactive,
                    last_error: stream.last_error.clone(),
                    ..RuntimeFacts::default()
                };
                self.store.set_runtime_facts(id, &facts).await?;
            }
            return Ok(());
        }

        let Some(ref handle) = stream.worker_handle else {
            // desired active with no worker: start one if the budget allows
            return self.restart_within_budget(&stream, "no worker attached").await;
        };
        let handle = WorkerHandle::new(handle.clone());

        let status = match self.inspect_worker(&handle).await {
            Ok(status) => status,
            Err(e) => {
                // inspect deadline or transport failure: record and retry next sweep
                self.persist_status(
                    &stream,
                    ConnectionStatus::Error,
                    Some(format!("inspect failed: {e}")),
                )
                .await?;
                return Ok(());
            }
        };

        match status.state {
            WorkerState::Missing => {
                self.store
                    .set_runtime_facts(
                        id,
                        &RuntimeFacts {
                            worker_handle: None,
                            worker_started_at: None,
                            last_error: Some("worker vanished".to_string()),
                            connection_status: ConnectionStatus::Error,
                            config_fingerprint: None,
                        },
                    )
                    .await?;
                let refreshed = self.store.get_stream(id).await?;
                self.restart_within_budget(&refreshed, "worker vanished").await
            }
            WorkerState::Exited => {
                let tail = match self.runtime.tail(&handle, self.config.log_tail_lines).await {
                    Ok(lines) if !lines.is_empty() => lines.join("\n"),
                    _ => status
                        .last_error
                        .unwrap_or_else(|| "worker exited".to_string()),
                };
                self.persist_status(
                    &stream,
                    ConnectionStatus::Error,
                    Some(format!("worker exited: {tail}")),
                )
                .await?;
                self.restart_within_budget(&stream, "worker exited").await
            }
            WorkerState::Running | WorkerState::Starting => {
                let worker_age = stream
                    .worker_started_at
                    .map(|t| Utc::now().signed_duration_since(t))
                    .and_then(|d| d.to_std().ok())
                    .unwrap_or(Duration::MAX);
                let connection = match self.recency.age(id) {
                    Some(age) if age < self.config.stale_after => ConnectionStatus::Connected,
                    _ if worker_age < self.config.start_grace => ConnectionStatus::Starting,
                    _ => ConnectionStatus::WorkerDown,
                };
                let last_error = match connection {
                    ConnectionStatus::Connected => None,
                    _ => stream.last_error.clone(),
                };
                self.persist_status(&stream, connection, last_error).await
            }
        }
    }

    /// Restart the stream's worker unless it has exhausted its budget;
    /// past the budget it stays in `error` until the operator edits
    /// the config or reactivates.
    async fn restart_within_budget(
        &self,
        stream: &Stream,
        reason: &str,
    ) -> Result<(), ReconcileError> {
        if !self.allow_restart(&stream.id) {
            if stream.connection_status != ConnectionStatus::Error
                || stream.last_error.as_deref() != Some("restart budget exhausted")
            {
                let mut facts = stream.facts();
                facts.connection_status = ConnectionStatus::Error;
                facts.last_error = Some("restart budget exhausted".to_string());
                self.store.set_runtime_facts(&stream.id, &facts).await?;
            }
            debug!(stream = %stream.id, reason, "restart suppressed by budget");
            return Ok(());
        }
        info!(stream = %stream.id, reason, "restarting worker");
        match self.activate_locked(&stream.id).await {
            Ok(_) => Ok(()),
            // start failure is already persisted; the next sweep retries
            Err(ReconcileError::Runtime(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn allow_restart(&self, id: &StreamId) -> bool {
        let mut restarts = self.restarts.lock();
        let window = restarts.entry(*id).or_default();
        let cutoff = Instant::now().checked_sub(Duration::from_secs(60));
        while window
            .front()
            .is_some_and(|t| cutoff.is_some_and(|cutoff| *t < cutoff))
        {
            window.pop_front();
        }
        if window.len() >= self.config.max_restarts_per_minute {
            return false;
        }
        window.push_back(Instant::now());
        true
    }

    async fn persist_status(
        &self,
        stream: &Stream,
        connection: ConnectionStatus,
        last_error: Option<String>,
    ) -> Result<(), ReconcileError> {
        if stream.connection_status == connection && stream.last_error == last_error {
            return Ok(());
        }
        let mut facts = stream.facts();
        facts.connection_status = connection;
        facts.last_error = last_error;
        self.store.set_runtime_facts(&stream.id, &facts).await?;
        Ok(())
    }

    async fn start_worker(&self, spec: &WorkerSpec) -> Result<WorkerHandle, RuntimeError> {
        match timeout(self.config.start_deadline, self.runtime.start(spec)).await {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::transient(format!(
                "start {} deadline exceeded",
                spec.handle
            ))),
        }
    }

    async fn stop_worker(&self, handle: &WorkerHandle) {
        let result = timeout(self.config.stop_deadline, self.runtime.stop(handle)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(handle = %handle, error = %e, "stop failed, clearing handle anyway"),
            Err(_) => warn!(handle = %handle, "stop deadline exceeded, clearing handle anyway"),
        }
    }

    async fn inspect_worker(&self, handle: &WorkerHandle) -> Result<WorkerStatus, RuntimeError> {
        match timeout(self.config.inspect_deadline, self.runtime.inspect(handle)).await {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::transient(format!(
                "inspect {handle} deadline exceeded"
            ))),
        }
    }

    /// Current driver-side view for the worker-logs endpoint.
    pub async fn worker_logs(
        &self,
        id: &StreamId,
        lines: usize,
    ) -> Result<(Stream, Option<WorkerStatus>, Vec<String>), ReconcileError> {
        let stream = self.store.get_stream(id).await?;
        let Some(ref handle) = stream.worker_handle else {
            return Ok((stream, None, Vec::new()));
        };
        let handle = WorkerHandle::new(handle.clone());
        let status = self.inspect_worker(&handle).await.ok();
        let logs = self
            .runtime
            .tail(&handle, lines)
            .await
            .unwrap_or_default();
        Ok((stream, status, logs))
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
