//! Lifecycle owner tying the queue, dispatcher and fallback sink together.
//!
//! A [`LogShipper`] is a self-contained instance: tests build isolated
//! shippers with [`LogShipper::with_transport`], while applications usually go
//! through the process-wide slot in [`crate::global`].

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{ConfigError, ShipperConfig};
use crate::context::Context;
use crate::dispatcher::{self, CLIENT_SERVICE, DispatcherHandle, DispatcherSettings, Progress};
use crate::drop_reporter::DropReporter;
use crate::fallback::FallbackSink;
use crate::level::Level;
use crate::log_record::LogRecord;
use crate::logger::Logger;
use crate::queue::{BoundedQueue, PushOutcome, deadline_after};
use crate::transport::{HttpTransport, HttpTransportConfig, Transport, TransportError};

/// Bound used when a shipper is dropped without an explicit shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while starting a shipper.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("a log shipper is already running; shut it down first")]
    AlreadyRunning,
}

/// State shared between the shipper and every [`Logger`] it hands out.
#[derive(Debug)]
pub(crate) struct ShipperCore {
    queue: Arc<BoundedQueue>,
    fallback: Arc<FallbackSink>,
    drops: DropReporter,
    remote_level: Level,
    mirror_to_console: bool,
}

impl ShipperCore {
    pub(crate) fn remote_level(&self) -> Level {
        self.remote_level
    }

    pub(crate) fn console_accepts(&self, level: Level) -> bool {
        self.fallback.accepts(level)
    }

    /// Route one record according to the remote and console thresholds.
    pub(crate) fn route(&self, record: LogRecord) {
        let level = record.level();
        if level < self.remote_level {
            self.fallback.emit(&record);
            return;
        }
        if self.mirror_to_console {
            self.fallback.emit(&record);
        }
        self.enqueue(record);
    }

    fn enqueue(&self, record: LogRecord) {
        let service = record.service().to_owned();
        match self.queue.push(record) {
            PushOutcome::Queued => {}
            PushOutcome::Closed(record) => self.fallback.emit(&record),
            outcome => {
                if let Some(total) = outcome.total_dropped() {
                    self.drops
                        .observe(total, |delta, total| self.report_drops(&service, delta, total));
                }
            }
        }
    }

    fn report_drops(&self, service: &str, delta: u64, total: u64) {
        warn!("jarvis_log_client queue: dropped {delta} records ({total} in total)");
        self.fallback.notice(
            service,
            "log queue overflow, records dropped",
            Context::new()
                .with("dropped", delta)
                .with("total_dropped", total)
                .with("policy", self.queue.policy().to_string()),
        );
    }

    /// Surface drops below the reporting threshold.
    fn report_pending_drops(&self) {
        self.drops.flush(self.queue.dropped_count(), |delta, total| {
            self.report_drops(CLIENT_SERVICE, delta, total)
        });
    }
}

/// Running log-shipping pipeline.
#[derive(Debug)]
pub struct LogShipper {
    core: Arc<ShipperCore>,
    progress: Arc<Progress>,
    dispatcher: Mutex<Option<DispatcherHandle>>,
    shut_down: AtomicBool,
}

impl LogShipper {
    /// Start a shipper delivering over HTTP with console fallback on stderr.
    pub fn start(config: ShipperConfig) -> Result<Self, InitError> {
        config.validate()?;
        let transport = HttpTransport::new(HttpTransportConfig {
            endpoint: config.endpoint(),
            credentials: config.credentials.clone(),
            connect_timeout: config.connect_timeout,
            request_timeout: config.request_timeout,
            headers: Vec::new(),
        })?;
        let fallback = FallbackSink::stderr(config.console_level);
        Self::with_transport(config, Box::new(transport), fallback)
    }

    /// Start a shipper around caller-supplied collaborators.
    ///
    /// The console threshold is the one `fallback` was built with;
    /// `config.console_level` is only used by [`LogShipper::start`].
    pub fn with_transport(
        config: ShipperConfig,
        transport: Box<dyn Transport>,
        fallback: FallbackSink,
    ) -> Result<Self, InitError> {
        config.validate()?;
        let queue = Arc::new(BoundedQueue::new(config.capacity, config.overflow_policy));
        let fallback = Arc::new(fallback);
        let progress = Arc::new(Progress::new());
        let handle = dispatcher::spawn(
            DispatcherSettings::from(&config),
            Arc::clone(&queue),
            transport,
            Arc::clone(&fallback),
            Arc::clone(&progress),
        )?;
        debug!(
            "jarvis_log_client shipper: started (capacity {}, batch {}, policy {})",
            config.capacity, config.max_batch_size, config.overflow_policy
        );
        Ok(Self {
            core: Arc::new(ShipperCore {
                queue,
                fallback,
                drops: DropReporter::new(config.drop_report_threshold),
                remote_level: config.remote_level,
                mirror_to_console: config.mirror_to_console,
            }),
            progress,
            dispatcher: Mutex::new(Some(handle)),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Logger facade tagging records with `service`.
    pub fn logger(&self, service: &str) -> Logger {
        Logger::new(service, Arc::clone(&self.core))
    }

    /// Wait until every record queued before this call has been delivered
    /// or handed to the fallback sink.
    ///
    /// Returns `false` if `timeout` elapses first or the dispatcher has
    /// stopped with records outstanding; those records stay queued.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.flush_until(deadline_after(Instant::now(), timeout))
    }

    fn flush_until(&self, deadline: Instant) -> bool {
        self.core.report_pending_drops();
        let target = self.core.queue.last_seq();
        if self.progress.completed() >= target {
            return true;
        }
        self.core.queue.request_drain();
        self.progress.wait_for(target, deadline)
    }

    /// Flush, stop the dispatcher and join it, all bounded by `timeout`.
    ///
    /// Returns `true` when every record queued at the time of the call was
    /// dispatched or fallen back. Records still queued at the deadline are
    /// dropped and counted on the console. A call racing a shutdown in
    /// progress waits for it to finish; later calls return `true`
    /// immediately.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        // held until the dispatcher is joined so concurrent callers wait
        let mut slot = self.dispatcher.lock();
        let Some(handle) = slot.take() else {
            return true;
        };
        let deadline = deadline_after(Instant::now(), timeout);
        let target = self.core.queue.last_seq();

        self.flush_until(deadline);
        let joined = handle.stop(deadline);
        self.core.report_pending_drops();
        self.shut_down.store(true, Ordering::Release);
        drop(slot);

        let complete = joined && self.progress.completed() >= target;
        debug!("jarvis_log_client shipper: shut down (complete: {complete})");
        complete
    }

    /// Whether [`LogShipper::shutdown`] has finished.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Records discarded by the queue's overflow policy.
    pub fn dropped_count(&self) -> u64 {
        self.core.queue.dropped_count()
    }

    /// Records currently waiting for the dispatcher.
    pub fn queue_len(&self) -> usize {
        self.core.queue.len()
    }
}

impl Drop for LogShipper {
    fn drop(&mut self) {
        if self.dispatcher.get_mut().is_some() {
            self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        }
    }
}

#[cfg(test)]
#[path = "shipper_tests.rs"]
mod tests;
