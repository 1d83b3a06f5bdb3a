//! Background dispatcher draining the queue into the transport.
//!
//! A single thread owns the [`Transport`] and runs this loop:
//!
//! 1. Dequeue up to `max_batch_size` records, waiting at most
//!    `flush_interval` (or `poll_interval` once something is queued).
//! 2. Split the batch into same-service runs and deliver each run in order.
//! 3. Retry retryable failures with jittered exponential backoff, refresh
//!    credentials once on a 401, and hand undeliverable runs to the fallback
//!    sink.
//! 4. Publish the last completed sequence number so `flush` can wait on it.
//!
//! Shutdown arrives as a deadline on a stop channel. Backoff sleeps wait on
//! that channel, so a pending retry is abandoned as soon as shutdown starts.
//! The final drain then makes one attempt per remaining batch until the
//! deadline and reports whatever is still queued as dropped.

mod progress;
mod state;


use std::cell::Cell;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use log::{debug, warn};

use crate::backoff::{BackoffPolicy, BackoffState};
use crate::config::ShipperConfig;
use crate::context::Context;
use crate::fallback::FallbackSink;
use crate::log_record::LogRecord;
use crate::queue::{Batch, BoundedQueue};
use crate::transport::{DeliveryOutcome, Transport};

pub use progress::Progress;
pub use state::DispatchState;

const THREAD_NAME: &str = "jarvis-log-dispatcher";

/// Service name attached to notices not tied to a caller's service.
pub const CLIENT_SERVICE: &str = "jarvis-log-client";

thread_local! {
    static ON_DISPATCHER: Cell<bool> = const { Cell::new(false) };
}

/// Whether the caller runs on a dispatcher thread.
///
/// Anything logged there (the HTTP stack included) must not be queued again,
/// or every send would produce the next batch.
#[cfg_attr(not(feature = "log-compat"), allow(dead_code))]
pub fn on_dispatcher_thread() -> bool {
    ON_DISPATCHER.with(Cell::get)
}

/// Batching and failure-handling knobs taken from [`ShipperConfig`].
#[derive(Clone, Debug)]
pub struct DispatcherSettings {
    pub max_batch_size: usize,
    pub flush_interval: Duration,
    pub poll_interval: Duration,
    pub backoff: BackoffPolicy,
    pub failure_threshold: u32,
    pub degraded_cooldown: Duration,
}

impl From<&ShipperConfig> for DispatcherSettings {
    fn from(config: &ShipperConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            flush_interval: config.flush_interval,
            poll_interval: config.poll_interval,
            backoff: config.backoff.clone(),
            failure_threshold: config.failure_threshold,
            degraded_cooldown: config.degraded_cooldown,
        }
    }
}

/// Owner's handle on a running dispatcher thread.
#[derive(Debug)]
pub struct DispatcherHandle {
    stop_tx: Sender<Instant>,
    queue: Arc<BoundedQueue>,
    thread: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signal shutdown with `deadline`, close the queue and join the thread.
    ///
    /// An HTTP request already in flight is not interrupted, so the join can
    /// outlast `deadline` by up to one request timeout.
    pub fn stop(self, deadline: Instant) -> bool {
        // Capacity one and a single send, so this never blocks.
        let _ = self.stop_tx.send(deadline);
        self.queue.close();
        if self.thread.join().is_err() {
            warn!("jarvis_log_client dispatcher: thread panicked");
            return false;
        }
        true
    }
}

/// Start the dispatcher thread.
pub fn spawn(
    settings: DispatcherSettings,
    queue: Arc<BoundedQueue>,
    transport: Box<dyn Transport>,
    fallback: Arc<FallbackSink>,
    progress: Arc<Progress>,
) -> io::Result<DispatcherHandle> {
    let (stop_tx, stop_rx) = bounded(1);
    let dispatcher = Dispatcher {
        backoff: BackoffState::new(settings.backoff.clone()),
        settings,
        queue: Arc::clone(&queue),
        transport,
        fallback,
        progress,
        state: DispatchState::new(),
        stop_rx,
        stop_deadline: None,
    };
    let thread = thread::Builder::new()
        .name(THREAD_NAME.into())
        .spawn(move || dispatcher.run())?;
    Ok(DispatcherHandle {
        stop_tx,
        queue,
        thread,
    })
}

/// Marks progress as stopped when the dispatcher exits, panics included.
struct StopOnExit(Arc<Progress>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.0.stop();
    }
}

struct Dispatcher {
    settings: DispatcherSettings,
    queue: Arc<BoundedQueue>,
    transport: Box<dyn Transport>,
    fallback: Arc<FallbackSink>,
    progress: Arc<Progress>,
    backoff: BackoffState,
    state: DispatchState,
    stop_rx: Receiver<Instant>,
    stop_deadline: Option<Instant>,
}

impl Dispatcher {
    fn run(mut self) {
        ON_DISPATCHER.with(|flag| flag.set(true));
        let _exit = StopOnExit(Arc::clone(&self.progress));
        let mut pending = Batch::default();
        while !self.stopping() {
            let batch = self.queue.dequeue_batch(
                self.settings.max_batch_size,
                self.settings.flush_interval,
                self.settings.poll_interval,
            );
            if batch.is_empty() {
                continue;
            }
            if self.stopping() {
                pending = batch;
                break;
            }
            self.dispatch(batch);
        }
        self.final_drain(pending);
    }

    fn stopping(&mut self) -> bool {
        if self.stop_deadline.is_none() {
            match self.stop_rx.try_recv() {
                Ok(deadline) => self.stop_deadline = Some(deadline),
                Err(TryRecvError::Disconnected) => self.stop_deadline = Some(Instant::now()),
                Err(TryRecvError::Empty) if self.queue.is_closed() => {
                    self.stop_deadline = Some(Instant::now());
                }
                Err(TryRecvError::Empty) => {}
            }
        }
        self.stop_deadline.is_some()
    }

    /// Sleep for `delay` unless shutdown arrives first. Returns `true` if
    /// the sleep was cut short.
    fn sleep_unless_stopped(&mut self, delay: Duration) -> bool {
        if self.stop_deadline.is_some() {
            return true;
        }
        match self.stop_rx.recv_timeout(delay) {
            Ok(deadline) => {
                self.stop_deadline = Some(deadline);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                self.stop_deadline = Some(Instant::now());
                true
            }
        }
    }

    fn dispatch(&mut self, batch: Batch) {
        let last_seq = batch.last_seq();
        let mut records = batch.into_records();
        for run in records.chunk_by_mut(|a, b| a.service() == b.service()) {
            self.deliver(run);
        }
        if let Some(seq) = last_seq {
            self.progress.advance(seq);
        }
    }

    fn deliver(&mut self, records: &mut [LogRecord]) {
        let Some(service) = records.first().map(|r| r.service().to_owned()) else {
            return;
        };
        if self.state.is_degraded(Instant::now()) {
            debug!(
                "jarvis_log_client dispatcher: degraded, {} records for {service} sent to console",
                records.len()
            );
            self.fallback.emit_all(records.iter());
            return;
        }

        let mut retry = 0;
        let mut refreshed = false;
        loop {
            for record in records.iter_mut() {
                record.record_attempt();
            }
            let reason = match self.transport.send(&service, records) {
                DeliveryOutcome::Success => {
                    self.state.record_success();
                    return;
                }
                DeliveryOutcome::ClientFailure { status, reason } => {
                    self.reject(&service, records, status, &reason);
                    return;
                }
                DeliveryOutcome::AuthFailure if !refreshed => {
                    refreshed = true;
                    if self.transport.refresh_credentials() {
                        debug!("jarvis_log_client dispatcher: credentials refreshed, retrying");
                        continue;
                    }
                    "credential refresh failed".to_owned()
                }
                DeliveryOutcome::AuthFailure => "credentials rejected after refresh".to_owned(),
                DeliveryOutcome::RetryableFailure(reason) => reason,
            };
            warn!(
                "jarvis_log_client dispatcher: delivery of {} records for {service} failed: {reason}",
                records.len()
            );
            if self.stopping() {
                break;
            }
            let Some(delay) = self.backoff.next_sleep(retry) else {
                break;
            };
            retry += 1;
            if self.sleep_unless_stopped(delay) {
                break;
            }
        }
        self.give_up(&service, records);
    }

    /// Non-retryable rejection: fall back without touching degraded mode.
    fn reject(&self, service: &str, records: &[LogRecord], status: Option<u16>, reason: &str) {
        warn!(
            "jarvis_log_client dispatcher: {} records for {service} rejected: {reason}",
            records.len()
        );
        self.fallback.notice(
            service,
            "remote log service rejected batch",
            Context::new()
                .with("status", status)
                .with("reason", reason)
                .with("records", records.len()),
        );
        self.fallback.emit_all(records);
    }

    fn give_up(&mut self, service: &str, records: &[LogRecord]) {
        self.fallback.emit_all(records);
        if self.stop_deadline.is_some() {
            return;
        }
        let cooldown = self.settings.degraded_cooldown;
        if self
            .state
            .record_failure(Instant::now(), self.settings.failure_threshold, cooldown)
        {
            warn!(
                "jarvis_log_client dispatcher: {} consecutive failures, using console for {cooldown:?}",
                self.state.consecutive_failures()
            );
            self.fallback.notice(
                service,
                "remote log service unavailable, routing records to console",
                Context::new()
                    .with("consecutive_failures", self.state.consecutive_failures())
                    .with(
                        "cooldown_ms",
                        u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX),
                    ),
            );
        }
    }

    /// One attempt per batch until `deadline`; anything left is dropped.
    fn final_drain(&mut self, mut batch: Batch) {
        let deadline = self.stop_deadline.unwrap_or_else(Instant::now);
        loop {
            if batch.is_empty() {
                batch = self.queue.dequeue_batch(
                    self.settings.max_batch_size,
                    Duration::ZERO,
                    Duration::ZERO,
                );
                if batch.is_empty() {
                    break;
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            self.dispatch(std::mem::take(&mut batch));
        }

        let dropped = batch.len() + self.queue.take_all().len();
        if dropped > 0 {
            warn!(
                "jarvis_log_client dispatcher: shutdown deadline reached, dropped {dropped} queued records"
            );
            self.fallback.notice(
                CLIENT_SERVICE,
                "shutdown deadline reached, queued records dropped",
                Context::new().with("dropped", dropped),
            );
        }
    }
}
