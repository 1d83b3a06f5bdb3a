//! Bounded FIFO between producer threads and the dispatcher.
//!
//! Producers call [`BoundedQueue::push`] from any thread; the single
//! dispatcher drains batches with [`BoundedQueue::dequeue_batch`]. All state
//! lives behind one `parking_lot::Mutex`, with condition variables for the
//! consumer (records available) and for producers under the blocking policy
//! (space available). The critical section never spans I/O.
//!
//! Every accepted record receives a monotonically increasing sequence number.
//! The dispatcher reports the last sequence it has finished with, which lets
//! `flush` wait for "everything queued before this call" without tracking
//! individual records.

mod policy;


use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::log_record::LogRecord;

pub use policy::OverflowPolicy;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Upper bound applied to waits so deadline arithmetic never overflows.
const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub(crate) fn deadline_after(start: Instant, wait: Duration) -> Instant {
    start + wait.min(MAX_WAIT)
}

/// Result of a push attempt.
#[derive(Debug)]
pub enum PushOutcome {
    /// The record was appended to the tail.
    Queued,
    /// The record was appended after evicting the head record.
    DroppedOldest { total_dropped: u64 },
    /// The blocking wait expired and the new record was discarded.
    DroppedNew { total_dropped: u64 },
    /// The queue no longer accepts records; ownership is handed back.
    Closed(LogRecord),
}

impl PushOutcome {
    /// Cumulative drop count if this push caused a drop.
    pub fn total_dropped(&self) -> Option<u64> {
        match self {
            Self::DroppedOldest { total_dropped } | Self::DroppedNew { total_dropped } => {
                Some(*total_dropped)
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
struct QueuedRecord {
    seq: u64,
    record: LogRecord,
}

/// Records drained in one dequeue, in enqueue order.
#[derive(Debug, Default)]
pub struct Batch {
    records: Vec<LogRecord>,
    last_seq: Option<u64>,
}

impl Batch {
    fn from_queued(queued: Vec<QueuedRecord>) -> Self {
        let last_seq = queued.last().map(|q| q.seq);
        Self {
            records: queued.into_iter().map(|q| q.record).collect(),
            last_seq,
        }
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<LogRecord> {
        self.records
    }

    /// Sequence number of the newest record in the batch.
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug)]
struct QueueState {
    records: VecDeque<QueuedRecord>,
    next_seq: u64,
    drain_requested: bool,
    closed: bool,
    /// Length at which a waiting consumer wants to be woken.
    wake_at_len: usize,
}

/// Thread-safe bounded queue with a configurable overflow policy.
#[derive(Debug)]
pub struct BoundedQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: AtomicU64,
}

impl BoundedQueue {
    /// Create a queue holding at most `capacity` records (minimum one).
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                records: VecDeque::with_capacity(capacity.min(1024)),
                next_seq: 1,
                drain_requested: false,
                closed: false,
                wake_at_len: usize::MAX,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Total records discarded by the overflow policy.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Sequence number of the most recently accepted record, or zero.
    pub fn last_seq(&self) -> u64 {
        self.state.lock().next_seq - 1
    }

    /// Append `record`, applying the overflow policy when full.
    ///
    /// Never panics and never surfaces an error to the caller; the outcome
    /// only reports what happened.
    pub fn push(&self, record: LogRecord) -> PushOutcome {
        let mut state = self.state.lock();
        if state.closed {
            return PushOutcome::Closed(record);
        }

        let mut outcome = PushOutcome::Queued;
        if state.records.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropOldest => {
                    state.records.pop_front();
                    let total_dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    outcome = PushOutcome::DroppedOldest { total_dropped };
                }
                OverflowPolicy::Block(wait) => {
                    let deadline = deadline_after(Instant::now(), wait);
                    while state.records.len() >= self.capacity && !state.closed {
                        if self.not_full.wait_until(&mut state, deadline).timed_out() {
                            break;
                        }
                    }
                    if state.closed {
                        return PushOutcome::Closed(record);
                    }
                    if state.records.len() >= self.capacity {
                        let total_dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        return PushOutcome::DroppedNew { total_dropped };
                    }
                }
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.records.push_back(QueuedRecord { seq, record });
        let len = state.records.len();
        if len == 1 || len >= state.wake_at_len {
            self.not_empty.notify_one();
        }
        outcome
    }

    /// Block the consumer until a batch is ready, then drain up to
    /// `max_count` records in FIFO order.
    ///
    /// Returns when any of these hold:
    /// * at least `max_count` records are queued,
    /// * `max_wait` has elapsed,
    /// * at least one record is queued and `poll_interval` has elapsed,
    /// * a drain was requested or the queue was closed.
    ///
    /// The returned batch may be empty.
    pub fn dequeue_batch(
        &self,
        max_count: usize,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Batch {
        let max_count = max_count.max(1);
        let start = Instant::now();
        let deadline = deadline_after(start, max_wait);
        let poll_deadline = deadline_after(start, poll_interval);

        let mut state = self.state.lock();
        loop {
            if state.records.len() >= max_count || state.drain_requested || state.closed {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wake_at = if state.records.is_empty() {
                deadline
            } else if now >= poll_deadline {
                break;
            } else {
                deadline.min(poll_deadline)
            };
            state.wake_at_len = max_count;
            self.not_empty.wait_until(&mut state, wake_at);
        }
        state.wake_at_len = usize::MAX;

        let take = state.records.len().min(max_count);
        let drained: Vec<QueuedRecord> = state.records.drain(..take).collect();
        if state.records.is_empty() {
            state.drain_requested = false;
        }
        drop(state);

        if take > 0 && matches!(self.policy, OverflowPolicy::Block(_)) {
            self.not_full.notify_all();
        }
        Batch::from_queued(drained)
    }

    /// Ask the consumer to stop waiting and drain until the queue is empty.
    pub fn request_drain(&self) {
        let mut state = self.state.lock();
        if !state.records.is_empty() {
            state.drain_requested = true;
        }
        drop(state);
        self.not_empty.notify_all();
    }

    /// Stop accepting records and wake every waiter.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Remove and return every queued record.
    pub fn take_all(&self) -> Batch {
        let drained: Vec<QueuedRecord> = self.state.lock().records.drain(..).collect();
        self.not_full.notify_all();
        Batch::from_queued(drained)
    }
}
