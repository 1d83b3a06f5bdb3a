//! Threshold-based reporting of queue overflow drops.
//!
//! The queue counts every dropped record. [`DropReporter`] decides when that
//! count has grown enough to be worth surfacing: once per `threshold` drops,
//! plus a final summary on flush or shutdown for whatever remains unreported.
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of drops between reports.
pub const DEFAULT_DROP_REPORT_THRESHOLD: u64 = 100;

#[derive(Debug)]
pub struct DropReporter {
    threshold: u64,
    reported: AtomicU64,
}

impl DropReporter {
    /// Create a reporter emitting once per `threshold` drops (minimum one).
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            reported: AtomicU64::new(0),
        }
    }

    /// Observe the cumulative drop total and call `report` with the number of
    /// drops since the previous report when a full threshold has accumulated.
    ///
    /// Concurrent observers race on a compare-exchange so each window is
    /// reported exactly once.
    pub fn observe(&self, total_dropped: u64, report: impl FnOnce(u64, u64)) {
        let prev = self.reported.load(Ordering::Relaxed);
        if total_dropped.saturating_sub(prev) < self.threshold {
            return;
        }
        if self
            .reported
            .compare_exchange(prev, total_dropped, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            report(total_dropped - prev, total_dropped);
        }
    }

    /// Report any drops not yet surfaced, regardless of the threshold.
    pub fn flush(&self, total_dropped: u64, report: impl FnOnce(u64, u64)) {
        let prev = self.reported.swap(total_dropped, Ordering::AcqRel);
        if total_dropped > prev {
            report(total_dropped - prev, total_dropped);
        }
    }
}

impl Default for DropReporter {
    fn default() -> Self {
        Self::new(DEFAULT_DROP_REPORT_THRESHOLD)
    }
}
