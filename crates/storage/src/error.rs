// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error taxonomy.

use of_core::ValidationError;
use thiserror::Error;

/// Errors from store operations.
///
/// `Validation` and `Conflict` are surfaced to API callers as-is;
/// `Database` failures propagate up and roll the operation back before
/// the caller releases its stream lock.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Map a database unique-violation onto `Conflict`, leaving other
    /// errors untouched.
    pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                return Self::Conflict(what.to_string());
            }
        }
        Self::Database(err)
    }
}
