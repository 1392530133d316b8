// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod-orchestrator runtime driver.
//!
//! Each worker is a single-replica deployment named after its handle,
//! so the orchestrator owns restarts of crashed pods while the
//! reconciler owns config-driven restarts. Logs come from whichever
//! pod currently backs the deployment.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::core::ErrorResponse;
use kube::{Client, Error as KubeError};
use tracing::{debug, info};

use of_core::WorkerHandle;

use super::{RuntimeError, WorkerRuntime, WorkerSpec, WorkerState, WorkerStatus};

/// Label selecting the pods of one worker deployment.
const HANDLE_LABEL: &str = "of/handle";
const APP_LABEL: &str = "app";
const APP_NAME: &str = "of-worker";

/// Driver over the Kubernetes API.
#[derive(Clone)]
pub struct KubernetesRuntime {
    client: Client,
    namespace: String,
}

impl KubernetesRuntime {
    /// Connect with in-cluster config or local kubeconfig.
    pub async fn new(namespace: impl Into<String>) -> Result<Self, RuntimeError> {
        let client = Client::try_default()
            .await
            .map_err(|e| RuntimeError::transient(format!("kube client: {e}")))?;
        Ok(Self { client, namespace: namespace.into() })
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

fn is_api_status(err: &KubeError, wanted: u16) -> bool {
    matches!(err, KubeError::Api(ErrorResponse { code, .. }) if *code == wanted)
}

fn worker_labels(spec: &WorkerSpec) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_string(), APP_NAME.to_string()),
        (HANDLE_LABEL.to_string(), spec.handle.to_string()),
        ("of/stream-id".to_string(), spec.stream_id.to_string()),
    ])
}

fn build_deployment(spec: &WorkerSpec) -> Deployment {
    let labels = worker_labels(spec);
    let env: Vec<EnvVar> = spec
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();

    Deployment {
        metadata: ObjectMeta {
            name: Some(spec.handle.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(BTreeMap::from([(
                    HANDLE_LABEL.to_string(),
                    spec.handle.to_string(),
                )])),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "worker".to_string(),
                        image: Some(spec.image.clone()),
                        env: Some(env),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn status_from_deployment(deployment: &Deployment) -> WorkerStatus {
    let started_at = deployment
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0);

    let Some(status) = deployment.status.as_ref() else {
        return WorkerStatus {
            state: WorkerState::Starting,
            started_at,
            last_error: None,
        };
    };

    // a failing replica set surfaces as a ReplicaFailure condition
    let failure = status.conditions.as_ref().and_then(|conditions| {
        conditions
            .iter()
            .find(|c| c.type_ == "ReplicaFailure" && c.status == "True")
    });
    if let Some(condition) = failure {
        return WorkerStatus {
            state: WorkerState::Exited,
            started_at,
            last_error: condition.message.clone(),
        };
    }

    let state = if status.ready_replicas.unwrap_or(0) >= 1 {
        WorkerState::Running
    } else {
        WorkerState::Starting
    };
    WorkerStatus {
        state,
        started_at,
        last_error: None,
    }
}

#[async_trait::async_trait]
impl WorkerRuntime for KubernetesRuntime {
    async fn start(&self, spec: &WorkerSpec) -> Result<WorkerHandle, RuntimeError> {
        let deployment = build_deployment(spec);
        match self
            .deployments()
            .create(&PostParams::default(), &deployment)
            .await
        {
            Ok(_) => {
                info!(handle = %spec.handle, image = %spec.image, "worker deployment created");
                Ok(spec.handle.clone())
            }
            Err(e) if is_api_status(&e, 409) => {
                // idempotent: the deployment already exists under this handle
                debug!(handle = %spec.handle, "start: deployment already exists");
                Ok(spec.handle.clone())
            }
            Err(e) if is_api_status(&e, 422) => Err(RuntimeError::permanent(format!(
                "deployment {} rejected: {e}",
                spec.handle
            ))),
            Err(e) => Err(RuntimeError::transient(format!(
                "create deployment {}: {e}",
                spec.handle
            ))),
        }
    }

    async fn stop(&self, handle: &WorkerHandle) -> Result<(), RuntimeError> {
        match self
            .deployments()
            .delete(handle.as_str(), &DeleteParams::default())
            .await
        {
            Ok(_) => {
                info!(handle = %handle, "worker deployment deleted");
                Ok(())
            }
            Err(e) if is_api_status(&e, 404) => Ok(()),
            Err(e) => Err(RuntimeError::transient(format!(
                "delete deployment {handle}: {e}"
            ))),
        }
    }

    async fn inspect(&self, handle: &WorkerHandle) -> Result<WorkerStatus, RuntimeError> {
        match self.deployments().get(handle.as_str()).await {
            Ok(deployment) => Ok(status_from_deployment(&deployment)),
            Err(e) if is_api_status(&e, 404) => Ok(WorkerStatus {
                state: WorkerState::Missing,
                started_at: None,
                last_error: None,
            }),
            Err(e) => Err(RuntimeError::transient(format!(
                "get deployment {handle}: {e}"
            ))),
        }
    }

    async fn tail(
        &self,
        handle: &WorkerHandle,
        lines: usize,
    ) -> Result<Vec<String>, RuntimeError> {
        let selector = format!("{HANDLE_LABEL}={handle}");
        let pods = self
            .pods()
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| RuntimeError::transient(format!("list pods for {handle}: {e}")))?;

        let Some(pod_name) = pods
            .items
            .iter()
            .filter_map(|p| p.metadata.name.clone())
            .next()
        else {
            return Ok(Vec::new());
        };

        let params = LogParams {
            tail_lines: Some(lines as i64),
            ..Default::default()
        };
        let text = self
            .pods()
            .logs(&pod_name, &params)
            .await
            .map_err(|e| RuntimeError::transient(format!("logs for {handle}: {e}")))?;
        Ok(text.lines().map(str::to_string).collect())
    }
}
