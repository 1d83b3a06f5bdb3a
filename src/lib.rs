//! In-process client that ships structured log records to the Jarvis log
//! service.
//!
//! Application threads log through a per-service [`Logger`]. Records are
//! buffered in a [`BoundedQueue`] and delivered in batches by one background
//! dispatcher thread over authenticated HTTP. Delivery failures are retried
//! with backoff; records that cannot be delivered are written to the console
//! through the [`FallbackSink`] so nothing disappears silently.
//!
//! ```no_run
//! use std::time::Duration;
//! use jarvis_log_client::{ShipperConfig, context};
//!
//! let config = ShipperConfig::builder()
//!     .with_app_credentials("my-app", "my-key")
//!     .apply_env()?
//!     .build()?;
//! let shipper = jarvis_log_client::init(config)?;
//! let log = shipper.logger("inventory");
//! log.info("stock updated", context! { "sku" => "A-12", "delta" => -3 });
//! jarvis_log_client::shutdown(Duration::from_secs(5));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod backoff;
pub mod config;
mod context;
mod dispatcher;
mod drop_reporter;
mod fallback;
mod formatter;
mod global;
mod level;
#[cfg(feature = "log-compat")]
mod log_compat;
mod log_record;
mod logger;
mod queue;
mod shipper;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use backoff::BackoffPolicy;
pub use config::{ConfigError, ShipperConfig, ShipperConfigBuilder};
pub use context::{Context, ContextValue};
pub use fallback::FallbackSink;
pub use formatter::{ConsoleFormatter, RecordFormatter, SharedFormatter};
#[cfg(any(test, feature = "test-util"))]
pub use global::reset_default;
pub use global::{default_shipper, flush, init, init_from_env, install, logger, shutdown};
pub use level::Level;
#[cfg(feature = "log-compat")]
pub use log_compat::LogBridge;
pub use log_record::LogRecord;
pub use logger::Logger;
pub use queue::{Batch, BoundedQueue, OverflowPolicy, PushOutcome};
pub use shipper::{DEFAULT_SHUTDOWN_TIMEOUT, InitError, LogShipper};
pub use transport::{
    AuthError, Credential, CredentialProvider, DeliveryOutcome, ServiceDiscovery,
    StaticCredentials, Transport,
};
