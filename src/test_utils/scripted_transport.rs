//! Transport double replaying a script of outcomes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::log_record::LogRecord;
use crate::transport::{DeliveryOutcome, Transport};

/// One recorded call to [`Transport::send`].
#[derive(Clone, Debug)]
pub struct SentBatch {
    pub service: String,
    pub messages: Vec<String>,
    pub attempts: Vec<u32>,
    pub outcome: DeliveryOutcome,
    pub at: Instant,
}

#[derive(Debug)]
struct ScriptState {
    script: VecDeque<DeliveryOutcome>,
    fallback: DeliveryOutcome,
    sent: Vec<SentBatch>,
    refreshes: usize,
    refresh_succeeds: bool,
    delay: Duration,
}

/// Cloneable transport double. Clones share the script and the call log, so
/// a test can hand one clone to the shipper and inspect another.
///
/// Scripted outcomes are consumed in order; once exhausted every call
/// returns the fallback outcome (success unless set otherwise).
#[derive(Clone, Debug)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::always(DeliveryOutcome::Success)
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `outcome` for every call.
    pub fn always(outcome: DeliveryOutcome) -> Self {
        Self::with_script([], outcome)
    }

    /// Replay `script`, then return `then` forever.
    pub fn with_script(
        script: impl IntoIterator<Item = DeliveryOutcome>,
        then: DeliveryOutcome,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                script: script.into_iter().collect(),
                fallback: then,
                sent: Vec::new(),
                refreshes: 0,
                refresh_succeeds: true,
                delay: Duration::ZERO,
            })),
        }
    }

    /// Sleep for `delay` inside every `send`, simulating a slow server.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = delay;
    }

    pub fn set_refresh_succeeds(&self, succeeds: bool) {
        self.state.lock().refresh_succeeds = succeeds;
    }

    /// Replace the outcome returned once the script is exhausted.
    pub fn set_fallback_outcome(&self, outcome: DeliveryOutcome) {
        self.state.lock().fallback = outcome;
    }

    pub fn boxed(&self) -> Box<dyn Transport> {
        Box::new(self.clone())
    }

    pub fn sent(&self) -> Vec<SentBatch> {
        self.state.lock().sent.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    pub fn refresh_count(&self) -> usize {
        self.state.lock().refreshes
    }

    /// Messages from calls that returned success, in delivery order.
    pub fn delivered_messages(&self) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|b| b.outcome == DeliveryOutcome::Success)
            .flat_map(|b| b.messages.iter().cloned())
            .collect()
    }

    /// Poll until at least `calls` sends were made or `timeout` passes.
    pub fn wait_for_calls(&self, calls: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.call_count() >= calls {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        self.call_count() >= calls
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, service: &str, records: &[LogRecord]) -> DeliveryOutcome {
        let delay = self.state.lock().delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.state.lock();
        let outcome = state
            .script
            .pop_front()
            .unwrap_or_else(|| state.fallback.clone());
        state.sent.push(SentBatch {
            service: service.to_owned(),
            messages: records.iter().map(|r| r.message().to_owned()).collect(),
            attempts: records.iter().map(LogRecord::attempt_count).collect(),
            outcome: outcome.clone(),
            at: Instant::now(),
        });
        outcome
    }

    fn refresh_credentials(&mut self) -> bool {
        let mut state = self.state.lock();
        state.refreshes += 1;
        state.refresh_succeeds
    }
}
