//! Log record representation shipped by the client.
//!
//! A [`LogRecord`] captures one log event: when it happened, how severe it
//! is, which service produced it, the message, and structured context. The
//! only mutable field is the delivery attempt counter, which the dispatcher
//! bumps for diagnostics.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::context::Context;
use crate::level::Level;

#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    level: Level,
    service: String,
    message: String,
    context: Context,
    attempt_count: u32,
}

impl LogRecord {
    /// Construct a record stamped with the current time.
    pub fn new(service: &str, level: Level, message: &str, context: Context) -> Self {
        Self::with_timestamp(Utc::now(), service, level, message, context)
    }

    /// Construct a record with an explicit timestamp.
    pub fn with_timestamp(
        timestamp: DateTime<Utc>,
        service: &str,
        level: Level,
        message: &str,
        context: Context,
    ) -> Self {
        Self {
            timestamp,
            level,
            service: service.to_owned(),
            message: message.to_owned(),
            context,
            attempt_count: 0,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp rendered as RFC 3339 with millisecond precision.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Number of delivery attempts made for this record so far.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempt_count = self.attempt_count.saturating_add(1);
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}
