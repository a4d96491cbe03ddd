use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide reconciliation counters.
#[derive(Debug, Default)]
pub struct ControllerMetrics {
    passes_total: AtomicU64,
    passes_skipped: AtomicU64,
    invalid_policies: AtomicU64,
    unsupported_kinds: AtomicU64,
    list_failures: AtomicU64,
    deletions: AtomicU64,
    already_gone: AtomicU64,
    delete_failures: AtomicU64,
    policies_deleted: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub passes_total: u64,
    pub passes_skipped: u64,
    pub invalid_policies: u64,
    pub unsupported_kinds: u64,
    pub list_failures: u64,
    pub deletions: u64,
    pub already_gone: u64,
    pub delete_failures: u64,
    pub policies_deleted: u64,
}

impl ControllerMetrics {
    pub fn on_pass(&self) {
        self.passes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_pass_skipped(&self) {
        self.passes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_invalid_policy(&self) {
        self.invalid_policies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_unsupported_kind(&self) {
        self.unsupported_kinds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_list_failure(&self) {
        self.list_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_deleted(&self) {
        self.deletions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_already_gone(&self) {
        self.already_gone.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_delete_failure(&self) {
        self.delete_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_policy_deleted(&self) {
        self.policies_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            passes_total: self.passes_total.load(Ordering::Relaxed),
            passes_skipped: self.passes_skipped.load(Ordering::Relaxed),
            invalid_policies: self.invalid_policies.load(Ordering::Relaxed),
            unsupported_kinds: self.unsupported_kinds.load(Ordering::Relaxed),
            list_failures: self.list_failures.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            already_gone: self.already_gone.load(Ordering::Relaxed),
            delete_failures: self.delete_failures.load(Ordering::Relaxed),
            policies_deleted: self.policies_deleted.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = ControllerMetrics::default();
        metrics.on_pass();
        metrics.on_pass();
        metrics.on_deleted();
        metrics.on_delete_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.passes_total, 2);
        assert_eq!(snapshot.deletions, 1);
        assert_eq!(snapshot.delete_failures, 1);
        assert_eq!(snapshot.list_failures, 0);
    }
}
