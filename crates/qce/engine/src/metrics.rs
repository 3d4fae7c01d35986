//! Execution counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every worker of a run.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    methods_invoked: AtomicU64,
    methods_succeeded: AtomicU64,
    methods_failed: AtomicU64,
    methods_skipped: AtomicU64,
    questions_completed: AtomicU64,
    questions_failed: AtomicU64,
    fatal_aborts: AtomicU64,
}

/// Point-in-time copy of [`ExecutionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub methods_invoked: u64,
    pub methods_succeeded: u64,
    pub methods_failed: u64,
    /// Non-essential methods whose failure was tolerated.
    pub methods_skipped: u64,
    pub questions_completed: u64,
    pub questions_failed: u64,
    pub fatal_aborts: u64,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn method_invoked(&self) {
        self.methods_invoked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn method_succeeded(&self) {
        self.methods_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn method_failed(&self) {
        self.methods_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn method_skipped(&self) {
        self.methods_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn question_completed(&self) {
        self.questions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn question_failed(&self) {
        self.questions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fatal_abort(&self) {
        self.fatal_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            methods_invoked: self.methods_invoked.load(Ordering::Relaxed),
            methods_succeeded: self.methods_succeeded.load(Ordering::Relaxed),
            methods_failed: self.methods_failed.load(Ordering::Relaxed),
            methods_skipped: self.methods_skipped.load(Ordering::Relaxed),
            questions_completed: self.questions_completed.load(Ordering::Relaxed),
            questions_failed: self.questions_failed.load(Ordering::Relaxed),
            fatal_aborts: self.fatal_aborts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_across_threads() {
        let metrics = Arc::new(ExecutionMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.method_invoked();
                    }
                    metrics.question_completed();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.methods_invoked, 800);
        assert_eq!(snapshot.questions_completed, 8);
        assert_eq!(snapshot.fatal_aborts, 0);
    }
}
