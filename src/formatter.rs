//! Formatters rendering records as single console lines.
//!
//! Provides the [`RecordFormatter`] trait alongside [`SharedFormatter`], a
//! cheaply cloneable trait object used by the fallback sink.

use std::{fmt, sync::Arc};

use crate::log_record::LogRecord;

/// Trait for rendering log records into one human-readable line.
///
/// Implementors must be thread-safe (`Send + Sync`) because the fallback sink
/// is shared between producers and the dispatcher.
pub trait RecordFormatter: Send + Sync {
    /// Render `record` without a trailing newline.
    fn format(&self, record: &LogRecord) -> String;
}

/// Shared formatter trait object.
#[derive(Clone)]
pub struct SharedFormatter {
    inner: Arc<dyn RecordFormatter>,
}

impl SharedFormatter {
    pub fn new<F>(formatter: F) -> Self
    where
        F: RecordFormatter + 'static,
    {
        Self {
            inner: Arc::new(formatter),
        }
    }

    pub fn format(&self, record: &LogRecord) -> String {
        self.inner.format(record)
    }
}

impl Default for SharedFormatter {
    fn default() -> Self {
        Self::new(ConsoleFormatter)
    }
}

impl fmt::Debug for SharedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFormatter(<dyn RecordFormatter>)")
    }
}

/// `2025-03-01T12:30:05.000Z [ERROR] billing: charge failed | {"order":42}`
#[derive(Copy, Clone, Debug, Default)]
pub struct ConsoleFormatter;

impl RecordFormatter for ConsoleFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let mut output = format!(
            "{} [{}] {}: {}",
            record.timestamp_rfc3339(),
            record.level(),
            record.service(),
            record.message()
        );
        if !record.context().is_empty() {
            output.push_str(" | ");
            output.push_str(&record.context().to_string());
        }
        // Keep one record per line even for multi-line messages.
        if output.contains('\n') {
            output = output.replace('\n', "\\n");
        }
        output
    }
}

impl RecordFormatter for Arc<dyn RecordFormatter> {
    fn format(&self, record: &LogRecord) -> String {
        (**self).format(record)
    }
}
