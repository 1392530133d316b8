// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container-daemon runtime driver.
//!
//! One named container per worker; the container name doubles as the
//! handle. The full stream config travels as environment variables, so
//! a worker restart is always create-with-new-env.

use std::collections::HashMap;

use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, ContainerStateStatusEnum};
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use of_core::WorkerHandle;

use super::{RuntimeError, WorkerRuntime, WorkerSpec, WorkerState, WorkerStatus};

/// Label attached to every worker container.
const STREAM_LABEL: &str = "of.stream-id";

/// Driver over the local container daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using the daemon's local defaults (unix socket or
    /// platform equivalent).
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::transient(format!("docker connect: {e}")))?;
        Ok(Self { docker })
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!(image, "pulling worker image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(step) = progress.next().await {
            // a pull that fails midway is permanent: the operator must
            // fix the image reference or registry access
            step.map_err(|e| RuntimeError::permanent(format!("image pull {image}: {e}")))?;
        }
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_status(&e, 404) => Ok(()),
            Err(e) => Err(RuntimeError::transient(format!("remove {name}: {e}"))),
        }
    }
}

fn is_status(err: &DockerError, wanted: u16) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError { status_code, .. } if *status_code == wanted
    )
}

/// Map a daemon inspect response onto the normalized worker state.
fn status_from_inspect(inspect: &ContainerInspectResponse) -> WorkerStatus {
    let state = inspect.state.as_ref();
    let status = state.and_then(|s| s.status);

    let worker_state = match status {
        Some(ContainerStateStatusEnum::RUNNING) | Some(ContainerStateStatusEnum::PAUSED) => {
            WorkerState::Running
        }
        Some(ContainerStateStatusEnum::CREATED) | Some(ContainerStateStatusEnum::RESTARTING) => {
            WorkerState::Starting
        }
        Some(ContainerStateStatusEnum::REMOVING) => WorkerState::Missing,
        Some(_) => WorkerState::Exited,
        None => match state.and_then(|s| s.running) {
            Some(true) => WorkerState::Running,
            _ => WorkerState::Exited,
        },
    };

    let started_at = state
        .and_then(|s| s.started_at.as_deref())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc))
        // the daemon reports year 1 for never-started containers
        .filter(|t| t.timestamp() > 0);

    let last_error = state.and_then(|s| {
        if let Some(ref err) = s.error {
            if !err.is_empty() {
                return Some(err.clone());
            }
        }
        match s.exit_code {
            Some(code) if code != 0 => Some(format!("exited with code {code}")),
            _ => None,
        }
    });

    WorkerStatus {
        state: worker_state,
        started_at,
        last_error,
    }
}

#[async_trait::async_trait]
impl WorkerRuntime for DockerRuntime {
    async fn start(&self, spec: &WorkerSpec) -> Result<WorkerHandle, RuntimeError> {
        let name = spec.handle.as_str();

        // Idempotence: a live container under this handle is the worker.
        match self.docker.inspect_container(name, None).await {
            Ok(existing) => {
                let status = status_from_inspect(&existing);
                if matches!(status.state, WorkerState::Running | WorkerState::Starting) {
                    debug!(handle = name, "start: container already live");
                    return Ok(spec.handle.clone());
                }
                // stale exited container blocks the name
                self.remove_container(name).await?;
            }
            Err(e) if is_status(&e, 404) => {}
            Err(e) => return Err(RuntimeError::transient(format!("inspect {name}: {e}"))),
        }

        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };
        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let labels: HashMap<String, String> =
            HashMap::from([(STREAM_LABEL.to_string(), spec.stream_id.to_string())]);
        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(env),
            labels: Some(labels),
            ..Default::default()
        };

        if let Err(e) = self
            .docker
            .create_container(Some(options.clone()), config.clone())
            .await
        {
            if is_status(&e, 404) {
                // image absent locally
                self.pull_image(&spec.image).await?;
                self.docker
                    .create_container(Some(options), config)
                    .await
                    .map_err(|e| RuntimeError::transient(format!("create {name}: {e}")))?;
            } else if is_status(&e, 409) {
                // raced another create for the same handle; fall through
                debug!(handle = name, "create raced, starting existing container");
            } else {
                return Err(RuntimeError::transient(format!("create {name}: {e}")));
            }
        }

        match self
            .docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => {}
            Err(e) if is_status(&e, 304) => {} // already started
            Err(e) => return Err(RuntimeError::transient(format!("start {name}: {e}"))),
        }

        info!(handle = name, image = %spec.image, "worker container started");
        Ok(spec.handle.clone())
    }

    async fn stop(&self, handle: &WorkerHandle) -> Result<(), RuntimeError> {
        let name = handle.as_str();
        match self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: 10 }))
            .await
        {
            Ok(()) => {}
            Err(e) if is_status(&e, 404) || is_status(&e, 304) => {}
            Err(e) => warn!(handle = name, error = %e, "stop before remove failed"),
        }
        self.remove_container(name).await?;
        info!(handle = name, "worker container removed");
        Ok(())
    }

    async fn inspect(&self, handle: &WorkerHandle) -> Result<WorkerStatus, RuntimeError> {
        match self.docker.inspect_container(handle.as_str(), None).await {
            Ok(inspect) => Ok(status_from_inspect(&inspect)),
            Err(e) if is_status(&e, 404) => Ok(WorkerStatus {
                state: WorkerState::Missing,
                started_at: None,
                last_error: None,
            }),
            Err(e) => Err(RuntimeError::transient(format!(
                "inspect {handle}: {e}"
            ))),
        }
    }

    async fn tail(
        &self,
        handle: &WorkerHandle,
        lines: usize,
    ) -> Result<Vec<String>, RuntimeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: lines.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.logs(handle.as_str(), Some(options));
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(output) => collected.push(render_log_line(output)),
                Err(e) if is_status(&e, 404) => {
                    return Err(RuntimeError::transient(format!("logs {handle}: gone")))
                }
                Err(e) => return Err(RuntimeError::transient(format!("logs {handle}: {e}"))),
            }
        }
        Ok(collected)
    }
}

fn render_log_line(output: LogOutput) -> String {
    let bytes = output.into_bytes();
    String::from_utf8_lossy(&bytes).trim_end().to_string()
}
