//! Single-writer counters aggregated by event kind, plus derived pressure.
//! Grounded on the teacher's `storage::Status`/`mvcc::Status` pattern: a
//! plain struct returned by value, no interior mutability exposed to
//! callers — the registry itself is all atomics internally.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_derive::{Deserialize, Serialize};

use crate::events::EventKind;

#[derive(Default)]
pub struct Metrics {
    created: AtomicU64,
    updated: AtomicU64,
    deleted: AtomicU64,
    expired: AtomicU64,
    locked: AtomicU64,
    unlocked: AtomicU64,
    expunged: AtomicU64,
    accessed: AtomicU64,
    lifespan_set: AtomicU64,
    lifespan_renewed: AtomicU64,
    eager_prune_triggered: AtomicU64,
    background_prune_runs: AtomicU64,
    snapshots_written: AtomicU64,
    snapshot_failures: AtomicU64,
}

/// Consistent point-in-time snapshot of the registry, plus derived
/// pressure (`current/max`, or 0 when `max == 0`, i.e. unlimited).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub keys: u64,
    pub max_keys: u64,
    pub pressure: f64,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub expired: u64,
    pub locked: u64,
    pub unlocked: u64,
    pub expunged: u64,
    pub accessed: u64,
    pub lifespan_set: u64,
    pub lifespan_renewed: u64,
    pub eager_prune_triggered: u64,
    pub background_prune_runs: u64,
    pub snapshots_written: u64,
    pub snapshot_failures: u64,
    pub events_dropped: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn record(&self, kind: EventKind) {
        let counter = match kind {
            EventKind::Created => &self.created,
            EventKind::Updated => &self.updated,
            EventKind::Deleted => &self.deleted,
            EventKind::Expired => &self.expired,
            EventKind::Locked => &self.locked,
            EventKind::Unlocked => &self.unlocked,
            EventKind::Expunged => &self.expunged,
            EventKind::Accessed => &self.accessed,
            EventKind::LifespanSet => &self.lifespan_set,
            EventKind::LifespanRenewed => &self.lifespan_renewed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eager_prune_triggered(&self) {
        self.eager_prune_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_background_prune_run(&self) {
        self.background_prune_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_written(&self) {
        self.snapshots_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_failure(&self) {
        self.snapshot_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// `current_keys` and `events_dropped` are read from the kernel/bus at
    /// snapshot time since neither is owned by this registry.
    pub fn snapshot(&self, current_keys: u64, max_keys: u64, events_dropped: u64) -> Stats {
        let pressure = if max_keys == 0 { 0.0 } else { current_keys as f64 / max_keys as f64 };
        Stats {
            keys: current_keys,
            max_keys,
            pressure,
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            locked: self.locked.load(Ordering::Relaxed),
            unlocked: self.unlocked.load(Ordering::Relaxed),
            expunged: self.expunged.load(Ordering::Relaxed),
            accessed: self.accessed.load(Ordering::Relaxed),
            lifespan_set: self.lifespan_set.load(Ordering::Relaxed),
            lifespan_renewed: self.lifespan_renewed.load(Ordering::Relaxed),
            eager_prune_triggered: self.eager_prune_triggered.load(Ordering::Relaxed),
            background_prune_runs: self.background_prune_runs.load(Ordering::Relaxed),
            snapshots_written: self.snapshots_written.load(Ordering::Relaxed),
            snapshot_failures: self.snapshot_failures.load(Ordering::Relaxed),
            events_dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_is_zero_when_unlimited() {
        let m = Metrics::new();
        let stats = m.snapshot(50, 0, 0);
        assert_eq!(stats.pressure, 0.0);
    }

    #[test]
    fn pressure_is_ratio_when_bounded() {
        let m = Metrics::new();
        let stats = m.snapshot(5, 10, 0);
        assert_eq!(stats.pressure, 0.5);
    }

    #[test]
    fn record_increments_matching_counter() {
        let m = Metrics::new();
        m.record(EventKind::Created);
        m.record(EventKind::Created);
        m.record(EventKind::Deleted);
        let stats = m.snapshot(0, 0, 0);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.deleted, 1);
    }
}
