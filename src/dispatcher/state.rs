//! Failure accounting for degraded mode.

use std::time::{Duration, Instant};

/// Consecutive-failure counter and degraded-mode deadline.
///
/// Owned by the dispatcher thread, so no synchronisation is needed.
#[derive(Debug, Default)]
pub struct DispatchState {
    consecutive_failures: u32,
    degraded_until: Option<Instant>,
}

impl DispatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether batches should bypass the network at `now`.
    pub fn is_degraded(&self, now: Instant) -> bool {
        self.degraded_until.is_some_and(|until| now < until)
    }

    /// Reset after a successful delivery.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.degraded_until = None;
    }

    /// Count a batch that exhausted its retries.
    ///
    /// Returns `true` when this failure (re)enters degraded mode. After a
    /// cooldown expires the counter is not reset, so one more failure
    /// re-enters immediately.
    pub fn record_failure(&mut self, now: Instant, threshold: u32, cooldown: Duration) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures < threshold || self.is_degraded(now) {
            return false;
        }
        self.degraded_until = Some(now + cooldown);
        true
    }
}
