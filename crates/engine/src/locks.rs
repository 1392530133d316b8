// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-stream serialization locks.
//!
//! Any operation that mutates a stream's runtime facts or worker
//! handle holds that stream's lock across the store write and the
//! runtime driver call, so concurrent activate/deactivate cannot
//! interleave. Entries are created on first reference and retained
//! until the stream record is deleted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use of_core::StreamId;

/// Lock map keyed by stream identity. Clones share the map.
#[derive(Clone, Default)]
pub struct StreamLocks {
    inner: Arc<Mutex<HashMap<StreamId, Arc<AsyncMutex<()>>>>>,
}

impl StreamLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &StreamId) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.inner.lock().entry(*id).or_default())
    }

    /// Wait for the stream's lock.
    pub async fn acquire(&self, id: &StreamId) -> OwnedMutexGuard<()> {
        self.entry(id).lock_owned().await
    }

    /// Take the lock only if it is free. The reconciliation sweep uses
    /// this to skip streams busy in an API-driven transition.
    pub fn try_acquire(&self, id: &StreamId) -> Option<OwnedMutexGuard<()>> {
        self.entry(id).try_lock_owned().ok()
    }

    /// Drop the entry once the stream record is gone.
    pub fn forget(&self, id: &StreamId) {
        self.inner.lock().remove(id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
