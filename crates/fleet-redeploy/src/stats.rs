//! Coordinator counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, shared between the coordinator and its handles
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    submitted: AtomicU64,
    matched: AtomicU64,
    unmatched: AtomicU64,
    dispatched: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    undelivered: AtomicU64,
}

/// Point-in-time copy of [`CoordinatorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Events accepted by `submit`
    pub submitted: u64,

    /// Events matching at least one trigger rule
    pub matched: u64,

    pub unmatched: u64,

    /// Requests handed to the sink when their window closed; a window
    /// counts as flushed only once `delivered` records the acknowledgment
    pub dispatched: u64,

    pub delivered: u64,

    /// Resends after a failed or unacknowledged attempt
    pub retried: u64,

    /// Requests dropped after the retry budget
    pub undelivered: u64,
}

impl CoordinatorStats {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_match(&self, matched: bool) {
        if matched {
            self.matched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.unmatched.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_undelivered(&self) {
        self.undelivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
        }
    }
}
