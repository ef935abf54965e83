use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Cumulative delivery counters, written by the hub coordinator only
#[derive(Debug, Default)]
pub(crate) struct DeliveryCounters {
    events: AtomicU64,
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    removed: AtomicU64,
}

impl DeliveryCounters {
    pub(crate) fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pass(&self, attempted: usize, succeeded: usize, failed: usize) {
        self.attempted.fetch_add(attempted as u64, Ordering::Relaxed);
        self.succeeded.fetch_add(succeeded as u64, Ordering::Relaxed);
        self.failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self, removed: usize) {
        self.removed.fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            events: self.events.load(Ordering::Relaxed),
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the hub's delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Events processed by the coordinator
    pub events: u64,
    /// Writes attempted to matching subscribers
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Subscribers dropped after a failed write
    pub removed: u64,
}
