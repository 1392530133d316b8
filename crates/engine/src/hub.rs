// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription hub: fan-out to bounded per-subscriber queues.
//!
//! Backpressure is strictly subscriber-local. Dispatch never blocks:
//! a full queue drops its oldest pending frame for the new one, and a
//! subscriber that does nothing but drop for too long is closed with
//! the policy flag so its transport can report it.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use of_core::{FrameMessage, StreamId};

use crate::metrics::EngineMetrics;

/// Default bounded queue depth per subscriber.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;
/// A subscriber that only dropped for more than this many consecutive
/// dispatches is closed.
pub const DEFAULT_OVERRUN_LIMIT: u64 = 64;

struct SubscriberSlot {
    filter: Option<StreamId>,
    queue: Mutex<VecDeque<FrameMessage>>,
    notify: Notify,
    closed: AtomicBool,
    /// Set when the hub closed the subscriber for overrunning.
    overrun: AtomicBool,
    dropped: AtomicU64,
    consecutive_drops: AtomicU64,
}

impl SubscriberSlot {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// The set of live UI subscribers.
pub struct SubscriptionHub {
    slots: Mutex<HashMap<u64, Arc<SubscriberSlot>>>,
    next_id: AtomicU64,
    queue_depth: usize,
    overrun_limit: u64,
    metrics: Arc<EngineMetrics>,
}

impl SubscriptionHub {
    pub fn new(metrics: Arc<EngineMetrics>) -> Self {
        Self::with_limits(metrics, DEFAULT_QUEUE_DEPTH, DEFAULT_OVERRUN_LIMIT)
    }

    pub fn with_limits(
        metrics: Arc<EngineMetrics>,
        queue_depth: usize,
        overrun_limit: u64,
    ) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_depth,
            overrun_limit,
            metrics,
        }
    }

    /// Register a subscriber; `filter = None` receives every stream.
    pub fn subscribe(&self, filter: Option<StreamId>) -> FrameSubscriber {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(SubscriberSlot {
            filter,
            queue: Mutex::new(VecDeque::with_capacity(self.queue_depth)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            overrun: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            consecutive_drops: AtomicU64::new(0),
        });
        self.slots.lock().insert(id, Arc::clone(&slot));
        debug!(subscriber = id, ?filter, "subscriber registered");
        FrameSubscriber { id, slot }
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Deliver a frame to every matching subscriber, non-blocking.
    pub fn dispatch(&self, msg: &FrameMessage) {
        let matching: Vec<(u64, Arc<SubscriberSlot>)> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.filter.is_none() || slot.filter == Some(msg.stream_id))
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();

        let mut stale = Vec::new();
        for (id, slot) in matching {
            if slot.closed.load(Ordering::Acquire) {
                stale.push(id);
                continue;
            }

            let mut queue = slot.queue.lock();
            if queue.len() >= self.queue_depth {
                // drop-oldest: evict the stalest pending frame
                queue.pop_front();
                slot.dropped.fetch_add(1, Ordering::Relaxed);
                self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
                let consecutive = slot.consecutive_drops.fetch_add(1, Ordering::Relaxed) + 1;
                if consecutive > self.overrun_limit {
                    queue.clear();
                    drop(queue);
                    slot.overrun.store(true, Ordering::Release);
                    slot.close();
                    stale.push(id);
                    debug!(subscriber = id, consecutive, "subscriber closed for overrun");
                    continue;
                }
            } else {
                slot.consecutive_drops.store(0, Ordering::Relaxed);
            }
            queue.push_back(msg.clone());
            drop(queue);
            slot.notify.notify_one();
        }

        if !stale.is_empty() {
            let mut slots = self.slots.lock();
            for id in stale {
                slots.remove(&id);
            }
        }
    }

    /// Close every subscriber, e.g. on shutdown.
    pub fn close_all(&self) {
        let slots = std::mem::take(&mut *self.slots.lock());
        for slot in slots.into_values() {
            slot.close();
        }
    }
}

/// Handle to one subscription: a lazy sequence of frame messages.
/// Dropping it unsubscribes.
pub struct FrameSubscriber {
    id: u64,
    slot: Arc<SubscriberSlot>,
}

impl FrameSubscriber {
    /// Next frame, in arrival order (modulo drop-oldest). `None` once
    /// the subscription is closed.
    pub async fn recv(&mut self) -> Option<FrameMessage> {
        loop {
            // arm the notification before checking the queue so a
            // dispatch between check and await cannot be missed
            let notified = self.slot.notify.notified();
            if let Some(msg) = self.slot.queue.lock().pop_front() {
                return Some(msg);
            }
            if self.slot.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Pop without waiting; `None` when the queue is momentarily empty.
    pub fn recv_now(&mut self) -> Option<FrameMessage> {
        self.slot.queue.lock().pop_front()
    }

    /// Frames evicted from this subscriber's queue so far.
    pub fn drop_count(&self) -> u64 {
        self.slot.dropped.load(Ordering::Relaxed)
    }

    /// True when the hub closed this subscriber for persistent overrun.
    pub fn was_overrun(&self) -> bool {
        self.slot.overrun.load(Ordering::Acquire)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for FrameSubscriber {
    fn drop(&mut self) {
        // producers observe the closed flag and unregister the slot
        self.slot.close();
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
