//! Unit tests for configuration building and environment layering.

use std::collections::HashMap;

use rstest::rstest;

use super::*;
use crate::transport::AuthScheme;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |name| map.get(name).cloned()
}

#[rstest]
fn defaults_match_documented_values() {
    let config = ShipperConfig::builder().build().expect("defaults are valid");
    assert_eq!(config.console_level, Level::Warning);
    assert_eq!(config.remote_level, Level::Debug);
    assert_eq!(config.max_batch_size, 50);
    assert_eq!(config.flush_interval, Duration::from_secs(5));
    assert_eq!(config.poll_interval, config.flush_interval);
    assert_eq!(config.request_timeout, Duration::from_secs(10));
    assert_eq!(config.backoff.max_retries, 3);
    assert_eq!(config.failure_threshold, 3);
    assert_eq!(config.degraded_cooldown, Duration::from_secs(30));
    assert_eq!(config.capacity, 10_000);
    assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
    assert!(config.credentials.is_none());
    assert!(!config.mirror_to_console);
}

#[rstest]
fn poll_interval_follows_flush_interval_unless_set() {
    let config = ShipperConfig::builder()
        .with_flush_interval(Duration::from_millis(700))
        .build()
        .expect("valid");
    assert_eq!(config.poll_interval, Duration::from_millis(700));

    let config = ShipperConfig::builder()
        .with_flush_interval(Duration::from_millis(700))
        .with_poll_interval(Duration::from_millis(50))
        .build()
        .expect("valid");
    assert_eq!(config.poll_interval, Duration::from_millis(50));
}

#[rstest]
#[case::batch(ShipperConfig::builder().with_max_batch_size(0), "max_batch_size")]
#[case::capacity(ShipperConfig::builder().with_capacity(0), "capacity")]
#[case::interval(ShipperConfig::builder().with_flush_interval(Duration::ZERO), "flush_interval")]
#[case::threshold(ShipperConfig::builder().with_failure_threshold(0), "failure_threshold")]
#[case::drop_reports(ShipperConfig::builder().with_drop_report_threshold(0), "drop_report_threshold")]
#[case::timeout(ShipperConfig::builder().with_request_timeout(Duration::ZERO), "request_timeout")]
fn zero_values_are_rejected(#[case] builder: ShipperConfigBuilder, #[case] field: &str) {
    let err = builder.build().expect_err("zero must be rejected");
    assert!(matches!(&err, ConfigError::Invalid(msg) if msg.contains(field)), "{err}");
}

#[rstest]
fn zero_check_covers_integer_and_duration_fields() {
    assert!(is_zero(&0_usize));
    assert!(is_zero(&0_u32));
    assert!(is_zero(&0_u64));
    assert!(is_zero(&Duration::ZERO));
    assert!(!is_zero(&1_u64));
    assert!(ShipperConfig::default().validate().is_ok());
}

#[rstest]
fn non_http_url_is_rejected() {
    let err = ShipperConfig::builder()
        .with_logs_url("ftp://logs")
        .build()
        .expect_err("scheme must be http(s)");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[rstest]
fn half_supplied_credentials_are_rejected() {
    let err = ShipperConfig::builder()
        .with_app_credentials("app", "")
        .build()
        .expect_err("key missing");
    assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("app credentials")));
}

#[rstest]
fn env_fills_unset_fields() {
    let lookup = env(&[
        (ENV_LOGS_URL, "http://logs.internal:9000"),
        (ENV_CONSOLE_LEVEL, "error"),
        (ENV_REMOTE_LEVEL, "INFO"),
        (ENV_BATCH_SIZE, "10"),
        (ENV_FLUSH_INTERVAL_MS, "250"),
        (ENV_QUEUE_CAPACITY, "64"),
        (ENV_OVERFLOW_POLICY, "block:20"),
    ]);
    let config = ShipperConfig::builder()
        .apply_env_with(lookup)
        .expect("env parses")
        .build()
        .expect("valid");
    assert_eq!(config.logs_url.as_deref(), Some("http://logs.internal:9000"));
    assert_eq!(config.console_level, Level::Error);
    assert_eq!(config.remote_level, Level::Info);
    assert_eq!(config.max_batch_size, 10);
    assert_eq!(config.flush_interval, Duration::from_millis(250));
    assert_eq!(config.capacity, 64);
    assert_eq!(
        config.overflow_policy,
        OverflowPolicy::Block(Duration::from_millis(20))
    );
}

#[rstest]
fn explicit_settings_win_over_env() {
    let lookup = env(&[(ENV_LOGS_URL, "http://env:1"), (ENV_BATCH_SIZE, "10")]);
    let config = ShipperConfig::builder()
        .with_logs_url("http://explicit:2")
        .with_max_batch_size(7)
        .apply_env_with(lookup)
        .expect("env parses")
        .build()
        .expect("valid");
    assert_eq!(config.logs_url.as_deref(), Some("http://explicit:2"));
    assert_eq!(config.max_batch_size, 7);
}

#[rstest]
#[case::bad_level(ENV_CONSOLE_LEVEL, "loud")]
#[case::bad_number(ENV_BATCH_SIZE, "many")]
fn malformed_env_values_are_errors(#[case] name: &'static str, #[case] value: &'static str) {
    let result = ShipperConfig::builder().apply_env_with(env(&[(name, value)]));
    assert!(matches!(result, Err(ConfigError::InvalidEnv { name: n, .. }) if n == name));
}

#[rstest]
fn app_credentials_from_env_take_precedence_over_node() {
    let lookup = env(&[
        (ENV_APP_ID, "app"),
        (ENV_APP_KEY, "secret"),
        (ENV_NODE_ID, "node"),
        (ENV_NODE_KEY, "nk"),
    ]);
    let config = ShipperConfig::builder()
        .apply_env_with(lookup)
        .expect("env parses")
        .build()
        .expect("valid");
    let credential = config
        .credentials
        .expect("credentials resolved")
        .credential()
        .expect("static credential");
    assert_eq!(credential.scheme, AuthScheme::AppKey);
}

#[rstest]
fn node_credentials_from_env() {
    let lookup = env(&[(ENV_NODE_ID, "node"), (ENV_NODE_KEY, "nk")]);
    let config = ShipperConfig::builder()
        .apply_env_with(lookup)
        .expect("env parses")
        .build()
        .expect("valid");
    let credential = config
        .credentials
        .expect("credentials resolved")
        .credential()
        .expect("static credential");
    assert_eq!(credential.scheme, AuthScheme::NodeKey);
}

#[rstest]
fn partial_env_credentials_are_ignored() {
    let config = ShipperConfig::builder()
        .apply_env_with(env(&[(ENV_APP_ID, "app")]))
        .expect("env parses")
        .build()
        .expect("valid");
    assert!(config.credentials.is_none());
}

struct FixedDiscovery(&'static str);

impl ServiceDiscovery for FixedDiscovery {
    fn service_url(&self, _service: &str) -> Option<String> {
        Some(self.0.to_owned())
    }
}

#[rstest]
fn endpoint_prefers_configured_url_over_discovery() {
    let config = ShipperConfig::builder()
        .with_logs_url("http://configured")
        .with_service_discovery(Arc::new(FixedDiscovery("http://discovered")))
        .build()
        .expect("valid");
    assert_eq!(config.endpoint().base_url(), "http://configured");
}

#[rstest]
fn endpoint_uses_discovery_then_default() {
    let config = ShipperConfig::builder()
        .with_service_discovery(Arc::new(FixedDiscovery("http://discovered/")))
        .build()
        .expect("valid");
    assert_eq!(config.endpoint().base_url(), "http://discovered");

    let config = ShipperConfig::default();
    assert_eq!(config.endpoint().base_url(), DEFAULT_LOGS_URL);
}
