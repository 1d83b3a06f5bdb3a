//! Exponential backoff schedule used between delivery retries.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Default base delay for the first retry.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Default ceiling for a single retry delay.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(5);
/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const MIN_SLEEP_MS: u64 = 10;

/// Exponential backoff policy bounded by a retry count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            cap: DEFAULT_BACKOFF_CAP,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl BackoffPolicy {
    /// Upper bound of the delay before retry number `retry` (zero based).
    pub fn ceiling(&self, retry: u32) -> Duration {
        let factor = 1_u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

/// Produces jittered delays following [`BackoffPolicy`].
pub struct BackoffState {
    policy: BackoffPolicy,
    rng: StdRng,
}

impl BackoffState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            rng: StdRng::from_entropy(),
        }
    }

    /// Delay before retry number `retry`, or `None` once retries are exhausted.
    pub fn next_sleep(&mut self, retry: u32) -> Option<Duration> {
        if retry >= self.policy.max_retries {
            return None;
        }
        let max_ms = self.policy.ceiling(retry).as_millis().min(u128::from(u64::MAX)) as u64;
        let sleep_ms = match max_ms {
            0 => 0,
            1..=MIN_SLEEP_MS => max_ms,
            _ => self.rng.gen_range(MIN_SLEEP_MS..=max_ms),
        };
        Some(Duration::from_millis(sleep_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_doubles_until_cap() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_millis(350),
            max_retries: 5,
        };
        assert_eq!(policy.ceiling(0), Duration::from_millis(100));
        assert_eq!(policy.ceiling(1), Duration::from_millis(200));
        assert_eq!(policy.ceiling(2), Duration::from_millis(350));
        assert_eq!(policy.ceiling(40), Duration::from_millis(350));
    }

    #[test]
    fn sleeps_stay_within_ceiling() {
        let policy = BackoffPolicy::default();
        let mut state = BackoffState::new(policy.clone());
        for retry in 0..DEFAULT_MAX_RETRIES {
            let delay = state.next_sleep(retry).expect("retry allowed");
            assert!(delay <= policy.ceiling(retry));
        }
    }

    #[test]
    fn exhausts_after_max_retries() {
        let mut state = BackoffState::new(BackoffPolicy {
            max_retries: 2,
            ..BackoffPolicy::default()
        });
        assert!(state.next_sleep(1).is_some());
        assert!(state.next_sleep(2).is_none());
    }

    #[test]
    fn zero_base_means_no_sleep() {
        let mut state = BackoffState::new(BackoffPolicy {
            base: Duration::ZERO,
            cap: Duration::ZERO,
            max_retries: 1,
        });
        assert_eq!(state.next_sleep(0), Some(Duration::ZERO));
    }
}
