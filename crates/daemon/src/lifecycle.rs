// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: assembly, startup, shutdown.
//!
//! Collaborators (store, runtime driver, frame bus) are constructed
//! once here and passed explicitly to the components that need them;
//! the root owns the shutdown token all loops hang off.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use of_adapters::{
    BusError, DockerRuntime, FrameBus, InfraEndpoints, KubernetesRuntime, RedisFrameBus,
    RuntimeError, WorkerRuntime,
};
use of_engine::{
    BrokerConfig, EngineMetrics, FrameBroker, FrameRecency, Reconciler, ReconcilerConfig,
    SettingsManager, StreamLocks, SubscriptionHub,
};
use of_storage::{Store, StoreError};

use crate::env::{self, DriverKind};
use crate::http::{router, AppState};
use crate::metrics::AppMetrics;

/// Fatal startup/runtime errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("runtime driver: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("frame bus: {0}")]
    Bus(#[from] BusError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Process configuration, resolved from the environment once at boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub http_addr: std::net::SocketAddr,
    pub driver: DriverKind,
    pub worker_image: String,
    pub kube_namespace: String,
    pub metrics_url: Option<String>,
    pub reconciler: ReconcilerConfig,
    pub broker: BrokerConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::database_url(),
            redis_url: env::redis_url(),
            http_addr: env::http_addr(),
            driver: env::runtime_driver(),
            worker_image: env::worker_image(),
            kube_namespace: env::kube_namespace(),
            metrics_url: env::metrics_url(),
            reconciler: ReconcilerConfig {
                interval: env::reconcile_interval(),
                start_grace: env::start_grace(),
                stale_after: env::stale_after(),
                ..Default::default()
            },
            broker: BrokerConfig {
                backoff_initial: env::broker_backoff_initial(),
                backoff_cap: env::broker_backoff_cap(),
            },
        }
    }
}

/// Constructed-once collaborators, injectable for tests.
pub struct Deps {
    pub store: Store,
    pub runtime: Arc<dyn WorkerRuntime>,
    pub bus: Arc<dyn FrameBus>,
    pub infra: InfraEndpoints,
    pub worker_image: String,
    pub reconciler: ReconcilerConfig,
    pub broker: BrokerConfig,
}

/// Assemble the engine, spawn its loops, and return the API state.
pub async fn build_state(
    deps: Deps,
    shutdown: CancellationToken,
) -> Result<AppState, DaemonError> {
    let engine_metrics = Arc::new(EngineMetrics::default());
    let hub = Arc::new(SubscriptionHub::new(Arc::clone(&engine_metrics)));
    let recency = Arc::new(FrameRecency::new());

    let reconciler = Arc::new(Reconciler::new(
        deps.store.clone(),
        deps.runtime,
        StreamLocks::new(),
        Arc::clone(&recency),
        deps.infra,
        deps.worker_image,
        deps.reconciler,
        Arc::clone(&engine_metrics),
    ));

    let initial_fps = deps.store.get_settings().await?.live_preview_fps;
    let settings = Arc::new(SettingsManager::new(
        deps.store.clone(),
        Arc::clone(&reconciler),
        initial_fps,
    ));

    let broker = FrameBroker::new(
        deps.bus,
        Arc::clone(&hub),
        settings.fps_watch(),
        recency,
        Arc::clone(&engine_metrics),
        deps.broker,
    );
    tokio::spawn(broker.run(shutdown.clone()));
    tokio::spawn(Arc::clone(&reconciler).run(shutdown.clone()));

    // subscribers end with the process, not with their sockets
    {
        let hub = Arc::clone(&hub);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            hub.close_all();
        });
    }

    let metrics = Arc::new(AppMetrics::new(engine_metrics, Arc::clone(&hub)));
    Ok(AppState {
        store: deps.store,
        reconciler,
        hub,
        settings,
        metrics,
    })
}

/// Full daemon run: connect collaborators, converge once, then serve
/// until a shutdown signal.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    let store = Store::connect(&config.database_url).await?;

    let runtime: Arc<dyn WorkerRuntime> = match config.driver {
        DriverKind::Docker => Arc::new(DockerRuntime::connect()?),
        DriverKind::Kubernetes => {
            Arc::new(KubernetesRuntime::new(config.kube_namespace.clone()).await?)
        }
    };
    let bus: Arc<dyn FrameBus> = Arc::new(RedisFrameBus::connect(&config.redis_url)?);

    let shutdown = CancellationToken::new();
    let state = build_state(
        Deps {
            store,
            runtime,
            bus,
            infra: InfraEndpoints {
                redis_url: config.redis_url.clone(),
                database_url: config.database_url.clone(),
                metrics_url: config.metrics_url.clone(),
            },
            worker_image: config.worker_image.clone(),
            reconciler: config.reconciler.clone(),
            broker: config.broker.clone(),
        },
        shutdown.clone(),
    )
    .await?;

    // startup convergence: re-adopt or clean up workers left behind by
    // a previous control plane
    if let Err(e) = state.reconciler.reconcile_all(&shutdown).await {
        warn!(error = %e, "startup reconciliation failed");
    }

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, driver = ?config.driver, "control api listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await?;

    info!("daemon stopped");
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
