//! Process-wide default shipper.
//!
//! The slot is a convenience indirection only: all state lives in the
//! [`LogShipper`] it holds, and tests can build isolated shippers instead.
//! Access is guarded by a `parking_lot::RwLock`; no call holds the lock while
//! flushing or joining.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::ShipperConfig;
use crate::logger::Logger;
use crate::shipper::{InitError, LogShipper};

static DEFAULT: Lazy<RwLock<Option<Arc<LogShipper>>>> = Lazy::new(|| RwLock::new(None));

/// Start a shipper from `config` and make it the process default.
///
/// Fails with [`InitError::AlreadyRunning`] while a previous default has not
/// been shut down.
pub fn init(config: ShipperConfig) -> Result<Arc<LogShipper>, InitError> {
    install_with(|| LogShipper::start(config))
}

/// [`init`] using defaults layered under the process environment.
pub fn init_from_env() -> Result<Arc<LogShipper>, InitError> {
    let config = ShipperConfig::builder().apply_env()?.build()?;
    init(config)
}

/// Make an already constructed shipper the process default.
pub fn install(shipper: LogShipper) -> Result<Arc<LogShipper>, InitError> {
    install_with(|| Ok(shipper))
}

fn install_with(
    make: impl FnOnce() -> Result<LogShipper, InitError>,
) -> Result<Arc<LogShipper>, InitError> {
    let mut slot = DEFAULT.write();
    if slot.as_ref().is_some_and(|current| !current.is_shut_down()) {
        return Err(InitError::AlreadyRunning);
    }
    let shipper = Arc::new(make()?);
    *slot = Some(Arc::clone(&shipper));
    Ok(shipper)
}

/// Current default shipper, if one was installed.
pub fn default_shipper() -> Option<Arc<LogShipper>> {
    DEFAULT.read().clone()
}

/// Logger from the default shipper.
pub fn logger(service: &str) -> Option<Logger> {
    default_shipper().map(|shipper| shipper.logger(service))
}

/// Flush the default shipper; `true` when there is none.
pub fn flush(timeout: Duration) -> bool {
    default_shipper().is_none_or(|shipper| shipper.flush(timeout))
}

/// Shut the default shipper down; `true` when there is none.
///
/// The shipper stays in the slot, marked shut down, so a later [`init`] can
/// replace it.
pub fn shutdown(timeout: Duration) -> bool {
    default_shipper().is_none_or(|shipper| shipper.shutdown(timeout))
}

/// Shut down and clear the default slot.
#[cfg(any(test, feature = "test-util"))]
pub fn reset_default() {
    let previous = DEFAULT.write().take();
    if let Some(shipper) = previous {
        shipper.shutdown(Duration::ZERO);
    }
}
