// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store handle: one pool, shared by clone.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use crate::error::StoreError;
use crate::schema;

/// Handle to the relational store. Cheap to clone; all clones share
/// the same connection pool.
#[derive(Debug, Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
}

impl Store {
    /// Connect to `dsn` and bring the schema up to date.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(dsn)?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(5));
        // A shared in-memory database exists per-connection; more than
        // one pooled connection would each see an empty schema.
        let max_connections = if dsn.contains(":memory:") || dsn.contains("mode=memory") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.bootstrap().await?;
        info!(dsn, "store ready");
        Ok(store)
    }

    /// In-memory store for tests and local experiments.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    /// Run the idempotent schema bootstrap.
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        schema::ensure_schema(&self.pool).await
    }
}
