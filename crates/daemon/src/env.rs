// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Which worker runtime the process drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Docker,
    Kubernetes,
}

/// Database DSN (`OF_DATABASE_URL`).
pub fn database_url() -> String {
    std::env::var("OF_DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://of-fleet.db?mode=rwc".to_string())
}

/// Pub/sub endpoint (`OF_REDIS_URL`).
pub fn redis_url() -> String {
    std::env::var("OF_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Control API bind address (`OF_HTTP_ADDR`).
pub fn http_addr() -> SocketAddr {
    parse_addr(std::env::var("OF_HTTP_ADDR").ok())
}

pub(crate) fn parse_addr(value: Option<String>) -> SocketAddr {
    value
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)))
}

/// Runtime driver selector (`OF_RUNTIME_DRIVER`, `docker` or
/// `kubernetes`).
pub fn runtime_driver() -> DriverKind {
    parse_driver(std::env::var("OF_RUNTIME_DRIVER").ok())
}

pub(crate) fn parse_driver(value: Option<String>) -> DriverKind {
    match value.as_deref() {
        Some("kubernetes") | Some("k8s") => DriverKind::Kubernetes,
        _ => DriverKind::Docker,
    }
}

/// Worker image reference (`OF_WORKER_IMAGE`).
pub fn worker_image() -> String {
    std::env::var("OF_WORKER_IMAGE").unwrap_or_else(|_| "of-worker:latest".to_string())
}

/// Namespace for the pod driver (`OF_KUBE_NAMESPACE`).
pub fn kube_namespace() -> String {
    std::env::var("OF_KUBE_NAMESPACE").unwrap_or_else(|_| "default".to_string())
}

/// Optional metrics push endpoint handed to workers (`OF_METRICS_URL`).
pub fn metrics_url() -> Option<String> {
    std::env::var("OF_METRICS_URL").ok().filter(|s| !s.is_empty())
}

/// Reconciliation sweep interval (`OF_RECONCILE_INTERVAL_MS`, default 5 s).
pub fn reconcile_interval() -> Duration {
    duration_ms("OF_RECONCILE_INTERVAL_MS", Duration::from_secs(5))
}

/// Stream-start grace window (`OF_START_GRACE_MS`, default 30 s).
pub fn start_grace() -> Duration {
    duration_ms("OF_START_GRACE_MS", Duration::from_secs(30))
}

/// Stale-frame threshold (`OF_STALE_AFTER_MS`, default 15 s).
pub fn stale_after() -> Duration {
    duration_ms("OF_STALE_AFTER_MS", Duration::from_secs(15))
}

/// Broker reconnect backoff start (`OF_BROKER_BACKOFF_MS`, default 500 ms).
pub fn broker_backoff_initial() -> Duration {
    duration_ms("OF_BROKER_BACKOFF_MS", Duration::from_millis(500))
}

/// Broker reconnect backoff cap (`OF_BROKER_BACKOFF_CAP_MS`, default 10 s).
pub fn broker_backoff_cap() -> Duration {
    duration_ms("OF_BROKER_BACKOFF_CAP_MS", Duration::from_secs(10))
}

/// Optional log directory (`OF_LOG_DIR`); unset logs to stderr only.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var("OF_LOG_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

fn duration_ms(var: &str, default: Duration) -> Duration {
    parse_duration_ms(std::env::var(var).ok(), default)
}

pub(crate) fn parse_duration_ms(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
