use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility of profile fetches.
/// Clones share the same underlying atomics.
#[derive(Clone, Default, Debug)]
pub struct FetchCounters {
    pub multi_lookups: Arc<AtomicU64>,
    pub single_lookups: Arc<AtomicU64>,
    pub failed_lookups: Arc<AtomicU64>,

    pub groups_retried: Arc<AtomicU64>,
    pub groups_fallen_back: Arc<AtomicU64>,
}

/// Point-in-time copy of [`FetchCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub multi_lookups: u64,
    pub single_lookups: u64,
    pub failed_lookups: u64,
    pub groups_retried: u64,
    pub groups_fallen_back: u64,
}

impl FetchCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            multi_lookups: self.multi_lookups.load(Ordering::Relaxed),
            single_lookups: self.single_lookups.load(Ordering::Relaxed),
            failed_lookups: self.failed_lookups.load(Ordering::Relaxed),
            groups_retried: self.groups_retried.load(Ordering::Relaxed),
            groups_fallen_back: self.groups_fallen_back.load(Ordering::Relaxed),
        }
    }
}
