//! Completion tracking shared between the dispatcher and `flush` callers.

use std::time::Instant;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct ProgressState {
    completed: u64,
    stopped: bool,
}

/// Highest queue sequence number the dispatcher has finished with.
///
/// "Finished" means delivered, handed to the fallback sink, or rejected; a
/// record counts once its batch leaves the dispatcher by any route.
#[derive(Debug, Default)]
pub struct Progress {
    state: Mutex<ProgressState>,
    changed: Condvar,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> u64 {
        self.state.lock().completed
    }

    pub fn advance(&self, seq: u64) {
        let mut state = self.state.lock();
        if seq > state.completed {
            state.completed = seq;
            self.changed.notify_all();
        }
    }

    /// Mark the dispatcher as exited; waiters stop waiting.
    pub fn stop(&self) {
        self.state.lock().stopped = true;
        self.changed.notify_all();
    }

    /// Block until `target` is completed, the dispatcher stops, or
    /// `deadline` passes. Returns whether `target` was reached.
    pub fn wait_for(&self, target: u64, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while state.completed < target {
            if state.stopped {
                return false;
            }
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.completed >= target;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn waiter_wakes_on_advance() {
        let progress = Arc::new(Progress::new());
        let waiter = {
            let progress = Arc::clone(&progress);
            thread::spawn(move || progress.wait_for(3, Instant::now() + Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(10));
        progress.advance(2);
        progress.advance(3);
        assert!(waiter.join().expect("waiter thread"));
    }

    #[test]
    fn wait_times_out() {
        let progress = Progress::new();
        progress.advance(1);
        assert!(!progress.wait_for(2, Instant::now() + Duration::from_millis(20)));
        assert!(progress.wait_for(1, Instant::now()));
    }

    #[test]
    fn stop_releases_waiters() {
        let progress = Progress::new();
        progress.stop();
        assert!(!progress.wait_for(1, Instant::now() + Duration::from_secs(5)));
    }

    #[test]
    fn completed_never_moves_backwards() {
        let progress = Progress::new();
        progress.advance(5);
        progress.advance(4);
        assert_eq!(progress.completed(), 5);
    }
}
