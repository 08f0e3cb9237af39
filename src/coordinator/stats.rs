//! Per-coordinator counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of a coordinator's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub actions_queued: u64,
    /// Batches that reached the endpoint and got a decodable answer.
    pub batches_sent: u64,
    pub batches_short_circuited: u64,
    pub batches_failed: u64,
    pub actions_resolved: u64,
    pub actions_rejected: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CoordinatorStats {
    actions_queued: AtomicU64,
    batches_sent: AtomicU64,
    batches_short_circuited: AtomicU64,
    batches_failed: AtomicU64,
    actions_resolved: AtomicU64,
    actions_rejected: AtomicU64,
}

impl CoordinatorStats {
    pub(crate) fn action_queued(&self) {
        self.actions_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn batch_sent(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn batch_short_circuited(&self) {
        self.batches_short_circuited.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn actions_settled(&self, resolved: u64, rejected: u64) {
        self.actions_resolved.fetch_add(resolved, Ordering::Relaxed);
        self.actions_rejected.fetch_add(rejected, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            actions_queued: self.actions_queued.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_short_circuited: self.batches_short_circuited.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            actions_resolved: self.actions_resolved.load(Ordering::Relaxed),
            actions_rejected: self.actions_rejected.load(Ordering::Relaxed),
        }
    }
}
