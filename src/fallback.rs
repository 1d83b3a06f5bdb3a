//! Local console sink used when remote delivery is unavailable.
//!
//! [`FallbackSink`] renders each record as one line and writes it to a local
//! stream (stderr by default). It applies its own `console_level` threshold,
//! independent of the remote threshold, so a record the caller declined to see
//! locally stays hidden even when its remote delivery fails.
//!
//! Writes happen synchronously under a short lock. Write errors are reported
//! through the `log` facade and otherwise ignored; the sink never panics and
//! never waits on remote I/O.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use parking_lot::Mutex;

use crate::context::Context;
use crate::formatter::{RecordFormatter, SharedFormatter};
use crate::level::Level;
use crate::log_record::LogRecord;

/// Console sink with an independent level filter.
pub struct FallbackSink {
    writer: Mutex<Box<dyn Write + Send>>,
    formatter: SharedFormatter,
    console_level: Level,
    emitted: AtomicU64,
}

impl FallbackSink {
    /// Sink writing to `stderr` with the default console formatter.
    pub fn stderr(console_level: Level) -> Self {
        Self::new(io::stderr(), SharedFormatter::default(), console_level)
    }

    /// Sink writing to an arbitrary writer.
    pub fn new<W>(writer: W, formatter: SharedFormatter, console_level: Level) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
            formatter,
            console_level,
            emitted: AtomicU64::new(0),
        }
    }

    /// Convenience constructor taking a concrete formatter.
    pub fn with_formatter<W, F>(writer: W, formatter: F, console_level: Level) -> Self
    where
        W: Write + Send + 'static,
        F: RecordFormatter + 'static,
    {
        Self::new(writer, SharedFormatter::new(formatter), console_level)
    }

    pub fn console_level(&self) -> Level {
        self.console_level
    }

    /// Whether a record at `level` would be written.
    pub fn accepts(&self, level: Level) -> bool {
        level >= self.console_level
    }

    /// Render and write one record if it passes the console threshold.
    pub fn emit(&self, record: &LogRecord) {
        if !self.accepts(record.level()) {
            return;
        }
        let line = self.formatter.format(record);
        let mut writer = self.writer.lock();
        if writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .is_err()
        {
            warn!("jarvis_log_client fallback: console write failed");
            return;
        }
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit every record of a batch in order.
    pub fn emit_all<'a>(&self, records: impl IntoIterator<Item = &'a LogRecord>) {
        for record in records {
            self.emit(record);
        }
    }

    /// Emit a synthetic WARNING describing a client-side condition.
    pub fn notice(&self, service: &str, message: &str, context: Context) {
        self.emit(&LogRecord::new(service, Level::Warning, message, context));
    }

    /// Number of lines written so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for FallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackSink")
            .field("console_level", &self.console_level)
            .field("emitted", &self.emitted())
            .finish()
    }
}
