//! Fixtures building an isolated shipper around a scripted transport and an
//! in-memory console, so properties can be checked without a network.

use std::time::Duration;

use jarvis_log_client::test_utils::{ScriptedTransport, SharedBuf};
use jarvis_log_client::{
    FallbackSink, Level, LogShipper, SharedFormatter, ShipperConfig, ShipperConfigBuilder,
};
use rstest::fixture;

/// Generous bound for waits that should finish almost immediately.
pub const WAIT: Duration = Duration::from_secs(5);

pub struct Pipeline {
    pub shipper: LogShipper,
    pub transport: ScriptedTransport,
    pub console: SharedBuf,
}

impl Pipeline {
    pub fn start(builder: ShipperConfigBuilder, transport: ScriptedTransport) -> Self {
        let console = SharedBuf::new();
        let config = builder.build().expect("valid config");
        let fallback = FallbackSink::new(console.clone(), SharedFormatter::default(), Level::Debug);
        let shipper = LogShipper::with_transport(config, transport.boxed(), fallback)
            .expect("shipper starts");
        Self {
            shipper,
            transport,
            console,
        }
    }

    /// Messages of non-notice records written to the console, in order.
    pub fn console_messages(&self) -> Vec<String> {
        self.console
            .lines()
            .into_iter()
            .filter(|line| !line.contains("[WARNING]"))
            .filter_map(|line| line.rsplit(": ").next().map(str::to_owned))
            .collect()
    }
}

/// Fast retries, long timers: batches leave on size or on an explicit flush.
pub fn quiet_config() -> ShipperConfigBuilder {
    ShipperConfig::builder()
        .with_flush_interval(Duration::from_secs(30))
        .with_backoff(Duration::from_millis(1), Duration::from_millis(4))
        .with_max_retries(2)
}

#[fixture]
pub fn pipeline(
    #[default(quiet_config())] builder: ShipperConfigBuilder,
    #[default(ScriptedTransport::new())] transport: ScriptedTransport,
) -> Pipeline {
    Pipeline::start(builder, transport)
}
