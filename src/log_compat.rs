//! Bridge from the `log` crate facade into a [`Logger`].
//!
//! [`LogBridge`] implements `log::Log`, so libraries already using `log::info!`
//! and friends ship through the same pipeline. Each record is translated
//! once (level mapped, structured key/values and source location captured as
//! context) and handed to the logger; the bridge never blocks on I/O and
//! never fails.
//!
//! Records are ignored when they come from the dispatcher thread or target
//! this crate or its HTTP stack. Those would feed back into the queue, and
//! the HTTP stack's debug output carries request headers.

use log::kv::{self, Key, Value, VisitSource};
use log::{Metadata, Record};

use crate::context::{Context, ContextValue};
use crate::dispatcher::on_dispatcher_thread;
use crate::level::Level;
use crate::logger::Logger;

const IGNORED_TARGETS: [&str; 4] = ["jarvis_log_client", "ureq", "native_tls", "rustls"];

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warning,
            log::Level::Error => Level::Error,
        }
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

fn kv_value(value: &Value<'_>) -> ContextValue {
    if let Some(b) = value.to_bool() {
        ContextValue::from(b)
    } else if let Some(i) = value.to_i64() {
        ContextValue::from(i)
    } else if let Some(u) = value.to_u64() {
        ContextValue::from(u)
    } else if let Some(f) = value.to_f64() {
        ContextValue::from(f)
    } else if let Some(s) = value.to_borrowed_str() {
        ContextValue::from(s)
    } else {
        ContextValue::from(value.to_string())
    }
}

/// Copies a record's key/value pairs into a [`Context`].
struct ContextVisitor<'a>(&'a mut Context);

impl<'kvs> VisitSource<'kvs> for ContextVisitor<'_> {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        self.0.insert(key.as_str(), kv_value(&value));
        Ok(())
    }
}

/// `log::Log` adapter forwarding records to one [`Logger`].
#[derive(Clone, Debug)]
pub struct LogBridge {
    logger: Logger,
}

impl LogBridge {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Install the bridge as the global `log` logger.
    ///
    /// Fails if another global logger is already set.
    pub fn install(self, max_level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(max_level);
        Ok(())
    }

    fn context_for(record: &Record<'_>) -> Context {
        let mut context = Context::new();
        // a failing source only loses its remaining pairs
        let _ = record.key_values().visit(&mut ContextVisitor(&mut context));
        context.insert("target", record.target());
        if let Some(module) = record.module_path() {
            context.insert("module", module);
        }
        if let Some(file) = record.file() {
            context.insert("file", file);
        }
        if let Some(line) = record.line() {
            context.insert("line", line);
        }
        context
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        !is_ignored(metadata.target())
            && !on_dispatcher_thread()
            && self.logger.is_enabled_for(metadata.level().into())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.logger.log(
            record.level().into(),
            &record.args().to_string(),
            Self::context_for(record),
        );
    }

    // Delivery is asynchronous; LogShipper::flush bounds the wait.
    fn flush(&self) {}
}
