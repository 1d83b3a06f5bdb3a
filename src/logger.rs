//! Per-service logging facade.

use std::sync::Arc;

use crate::context::Context;
use crate::level::Level;
use crate::log_record::LogRecord;
use crate::shipper::ShipperCore;

/// Cheap, cloneable handle that tags records with one service name.
///
/// Records at or above the remote threshold are queued for shipping; records
/// below it but at or above the console threshold are written to the console
/// straight away. Everything else is discarded without allocating a record.
/// Logging never blocks on I/O (except under the `block:N` overflow policy)
/// and never fails.
#[derive(Clone, Debug)]
pub struct Logger {
    service: Arc<str>,
    core: Arc<ShipperCore>,
}

impl Logger {
    pub(crate) fn new(service: &str, core: Arc<ShipperCore>) -> Self {
        Self {
            service: Arc::from(service),
            core,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Whether a record at `level` would go anywhere.
    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.core.remote_level() || self.core.console_accepts(level)
    }

    pub fn log(&self, level: Level, message: &str, context: Context) {
        if !self.is_enabled_for(level) {
            return;
        }
        self.core
            .route(LogRecord::new(&self.service, level, message, context));
    }

    pub fn debug(&self, message: &str, context: Context) {
        self.log(Level::Debug, message, context);
    }

    pub fn info(&self, message: &str, context: Context) {
        self.log(Level::Info, message, context);
    }

    pub fn warning(&self, message: &str, context: Context) {
        self.log(Level::Warning, message, context);
    }

    pub fn error(&self, message: &str, context: Context) {
        self.log(Level::Error, message, context);
    }

    pub fn critical(&self, message: &str, context: Context) {
        self.log(Level::Critical, message, context);
    }
}
