//! Shipper configuration and its builder.
//!
//! [`ShipperConfigBuilder`] collects optional overrides, layers environment
//! variables underneath them, and validates the result into a
//! [`ShipperConfig`]. Resolution order for every setting is: explicit builder
//! call, then the environment, then (for the URL) service discovery, then the
//! built-in default.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::backoff::{BackoffPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP, DEFAULT_MAX_RETRIES};
use crate::drop_reporter::DEFAULT_DROP_REPORT_THRESHOLD;
use crate::level::Level;
use crate::queue::{DEFAULT_QUEUE_CAPACITY, OverflowPolicy};
use crate::transport::{
    Credential, CredentialProvider, DEFAULT_LOGS_URL, Endpoint, ServiceDiscovery,
    StaticCredentials,
};

pub const ENV_LOGS_URL: &str = "JARVIS_LOGS_URL";
pub const ENV_APP_ID: &str = "JARVIS_APP_ID";
pub const ENV_APP_KEY: &str = "JARVIS_APP_KEY";
pub const ENV_NODE_ID: &str = "JARVIS_NODE_ID";
pub const ENV_NODE_KEY: &str = "JARVIS_NODE_KEY";
pub const ENV_CONSOLE_LEVEL: &str = "JARVIS_LOG_CONSOLE_LEVEL";
pub const ENV_REMOTE_LEVEL: &str = "JARVIS_LOG_REMOTE_LEVEL";
pub const ENV_BATCH_SIZE: &str = "JARVIS_LOG_BATCH_SIZE";
pub const ENV_FLUSH_INTERVAL_MS: &str = "JARVIS_LOG_FLUSH_INTERVAL_MS";
pub const ENV_QUEUE_CAPACITY: &str = "JARVIS_LOG_QUEUE_CAPACITY";
pub const ENV_OVERFLOW_POLICY: &str = "JARVIS_LOG_OVERFLOW_POLICY";

pub const DEFAULT_CONSOLE_LEVEL: Level = Level::Warning;
pub const DEFAULT_REMOTE_LEVEL: Level = Level::Debug;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_DEGRADED_COOLDOWN: Duration = Duration::from_secs(30);

/// Errors raised while building configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("unknown log level '{0}'")]
    InvalidLevel(String),
    #[error("invalid overflow policy: {0}")]
    InvalidPolicy(String),
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if is_zero(&$value) {
            Err(ConfigError::Invalid(format!("{} must be greater than zero", $field)))
        } else {
            Ok(())
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Fully resolved configuration consumed by [`LogShipper`](crate::LogShipper).
#[derive(Clone)]
pub struct ShipperConfig {
    /// Explicit or environment-provided base URL.
    pub logs_url: Option<String>,
    pub credentials: Option<Arc<dyn CredentialProvider>>,
    pub discovery: Option<Arc<dyn ServiceDiscovery>>,
    pub console_level: Level,
    pub remote_level: Level,
    /// Echo remote-bound records to the console at log time.
    pub mirror_to_console: bool,
    pub max_batch_size: usize,
    pub flush_interval: Duration,
    /// Early wake-up for partially filled batches; defaults to `flush_interval`.
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub failure_threshold: u32,
    pub degraded_cooldown: Duration,
    pub capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub drop_report_threshold: u64,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            logs_url: None,
            credentials: None,
            discovery: None,
            console_level: DEFAULT_CONSOLE_LEVEL,
            remote_level: DEFAULT_REMOTE_LEVEL,
            mirror_to_console: false,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            poll_interval: DEFAULT_FLUSH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            backoff: BackoffPolicy::default(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            degraded_cooldown: DEFAULT_DEGRADED_COOLDOWN,
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            drop_report_threshold: DEFAULT_DROP_REPORT_THRESHOLD,
        }
    }
}

impl ShipperConfig {
    pub fn builder() -> ShipperConfigBuilder {
        ShipperConfigBuilder::new()
    }

    /// Endpoint following explicit/env URL, then discovery, then default.
    pub fn endpoint(&self) -> Endpoint {
        match (&self.logs_url, &self.discovery) {
            (Some(url), _) => Endpoint::Fixed(url.clone()),
            (None, Some(discovery)) => Endpoint::Discovered {
                discovery: Arc::clone(discovery),
                fallback: DEFAULT_LOGS_URL.to_owned(),
            },
            (None, None) => Endpoint::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive!(self.max_batch_size, "max_batch_size")?;
        ensure_positive!(self.capacity, "capacity")?;
        ensure_positive!(self.flush_interval, "flush_interval")?;
        ensure_positive!(self.poll_interval, "poll_interval")?;
        ensure_positive!(self.request_timeout, "request_timeout")?;
        ensure_positive!(self.connect_timeout, "connect_timeout")?;
        ensure_positive!(self.failure_threshold, "failure_threshold")?;
        ensure_positive!(self.drop_report_threshold, "drop_report_threshold")?;
        if let Some(url) = &self.logs_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "logs_url must be an http(s) URL, got '{url}'"
            )));
        }
        if self.backoff.cap < self.backoff.base {
            return Err(ConfigError::Invalid(
                "backoff cap must not be below the base delay".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ShipperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShipperConfig")
            .field("logs_url", &self.logs_url)
            .field("credentials", &self.credentials.is_some())
            .field("discovery", &self.discovery.is_some())
            .field("console_level", &self.console_level)
            .field("remote_level", &self.remote_level)
            .field("max_batch_size", &self.max_batch_size)
            .field("flush_interval", &self.flush_interval)
            .field("capacity", &self.capacity)
            .field("overflow_policy", &self.overflow_policy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ShipperConfig`].
#[derive(Clone, Default)]
pub struct ShipperConfigBuilder {
    logs_url: Option<String>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    discovery: Option<Arc<dyn ServiceDiscovery>>,
    console_level: Option<Level>,
    remote_level: Option<Level>,
    mirror_to_console: Option<bool>,
    max_batch_size: Option<usize>,
    flush_interval: Option<Duration>,
    poll_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    max_retries: Option<u32>,
    backoff_base: Option<Duration>,
    backoff_cap: Option<Duration>,
    failure_threshold: Option<u32>,
    degraded_cooldown: Option<Duration>,
    capacity: Option<usize>,
    overflow_policy: Option<OverflowPolicy>,
    drop_report_threshold: Option<u64>,
    invalid_credentials: Option<&'static str>,
}

impl ShipperConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL of the log service.
    pub fn with_logs_url(mut self, url: impl Into<String>) -> Self {
        self.logs_url = Some(url.into());
        self
    }

    /// Authenticate with an app id/key pair.
    pub fn with_app_credentials(self, app_id: &str, app_key: &str) -> Self {
        if app_id.is_empty() || app_key.is_empty() {
            return self.reject_credentials("app credentials require both an id and a key");
        }
        self.with_static_credential(Credential::app(app_id, app_key))
    }

    /// Authenticate with a node id/key pair.
    pub fn with_node_credentials(self, node_id: &str, node_key: &str) -> Self {
        if node_id.is_empty() || node_key.is_empty() {
            return self.reject_credentials("node credentials require both an id and a key");
        }
        self.with_static_credential(Credential::node(node_id, node_key))
    }

    /// Authenticate with a fixed bearer token.
    pub fn with_bearer_token(self, app_id: &str, token: &str) -> Self {
        if token.is_empty() {
            return self.reject_credentials("bearer token must not be empty");
        }
        self.with_static_credential(Credential::bearer(app_id, token))
    }

    /// Use a custom credential collaborator.
    pub fn with_credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self.invalid_credentials = None;
        self
    }

    /// Look the URL up through service discovery when none is configured.
    pub fn with_service_discovery(mut self, discovery: Arc<dyn ServiceDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    fn with_static_credential(self, credential: Credential) -> Self {
        self.with_credential_provider(Arc::new(StaticCredentials::new(credential)))
    }

    fn reject_credentials(mut self, reason: &'static str) -> Self {
        self.invalid_credentials = Some(reason);
        self
    }

    option_setter!(
        #[doc = "Minimum level written to the console."]
        with_console_level,
        console_level,
        Level
    );
    option_setter!(
        #[doc = "Minimum level shipped to the remote service."]
        with_remote_level,
        remote_level,
        Level
    );
    option_setter!(
        #[doc = "Echo remote-bound records to the console at log time."]
        with_mirror_to_console,
        mirror_to_console,
        bool
    );
    option_setter!(
        #[doc = "Maximum records per batch."]
        with_max_batch_size,
        max_batch_size,
        usize
    );
    option_setter!(
        #[doc = "Longest wait before a partial batch is sent."]
        with_flush_interval,
        flush_interval,
        Duration
    );
    option_setter!(
        #[doc = "Early wake-up once at least one record is queued."]
        with_poll_interval,
        poll_interval,
        Duration
    );
    option_setter!(
        #[doc = "Bound on a single HTTP request."]
        with_request_timeout,
        request_timeout,
        Duration
    );
    option_setter!(
        #[doc = "Bound on establishing a connection."]
        with_connect_timeout,
        connect_timeout,
        Duration
    );
    option_setter!(
        #[doc = "Retries after the first failed attempt of a batch."]
        with_max_retries,
        max_retries,
        u32
    );
    option_setter!(
        #[doc = "Consecutive failed batches before degraded mode."]
        with_failure_threshold,
        failure_threshold,
        u32
    );
    option_setter!(
        #[doc = "How long degraded mode bypasses the network."]
        with_degraded_cooldown,
        degraded_cooldown,
        Duration
    );
    option_setter!(
        #[doc = "Queue capacity in records."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(
        #[doc = "Policy applied when the queue is full."]
        with_overflow_policy,
        overflow_policy,
        OverflowPolicy
    );
    option_setter!(
        #[doc = "Drops between overflow reports."]
        with_drop_report_threshold,
        drop_report_threshold,
        u64
    );

    /// Override the retry delay bounds.
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = Some(base);
        self.backoff_cap = Some(cap);
        self
    }

    /// Fill unset fields from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Fill unset fields from `lookup`, which maps variable names to values.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.credentials.is_none() && self.invalid_credentials.is_none() {
            if let (Some(id), Some(key)) = (get(ENV_APP_ID), get(ENV_APP_KEY)) {
                self = self.with_app_credentials(&id, &key);
            } else if let (Some(id), Some(key)) = (get(ENV_NODE_ID), get(ENV_NODE_KEY)) {
                self = self.with_node_credentials(&id, &key);
            }
        }
        if self.logs_url.is_none()
            && let Some(url) = get(ENV_LOGS_URL)
        {
            self.logs_url = Some(url);
        }
        if self.console_level.is_none()
            && let Some(v) = get(ENV_CONSOLE_LEVEL)
        {
            self.console_level = Some(parse_env(ENV_CONSOLE_LEVEL, &v)?);
        }
        if self.remote_level.is_none()
            && let Some(v) = get(ENV_REMOTE_LEVEL)
        {
            self.remote_level = Some(parse_env(ENV_REMOTE_LEVEL, &v)?);
        }
        if self.max_batch_size.is_none()
            && let Some(v) = get(ENV_BATCH_SIZE)
        {
            self.max_batch_size = Some(parse_env(ENV_BATCH_SIZE, &v)?);
        }
        if self.flush_interval.is_none()
            && let Some(v) = get(ENV_FLUSH_INTERVAL_MS)
        {
            let ms: u64 = parse_env(ENV_FLUSH_INTERVAL_MS, &v)?;
            self.flush_interval = Some(Duration::from_millis(ms));
        }
        if self.capacity.is_none()
            && let Some(v) = get(ENV_QUEUE_CAPACITY)
        {
            self.capacity = Some(parse_env(ENV_QUEUE_CAPACITY, &v)?);
        }
        if self.overflow_policy.is_none()
            && let Some(v) = get(ENV_OVERFLOW_POLICY)
        {
            self.overflow_policy = Some(v.parse()?);
        }
        Ok(self)
    }

    /// Validate and produce the final configuration.
    pub fn build(self) -> Result<ShipperConfig, ConfigError> {
        if let Some(reason) = self.invalid_credentials {
            return Err(ConfigError::Invalid(reason.into()));
        }
        let defaults = ShipperConfig::default();
        let flush_interval = self.flush_interval.unwrap_or(defaults.flush_interval);
        let config = ShipperConfig {
            logs_url: self.logs_url,
            credentials: self.credentials,
            discovery: self.discovery,
            console_level: self.console_level.unwrap_or(defaults.console_level),
            remote_level: self.remote_level.unwrap_or(defaults.remote_level),
            mirror_to_console: self.mirror_to_console.unwrap_or(defaults.mirror_to_console),
            max_batch_size: self.max_batch_size.unwrap_or(defaults.max_batch_size),
            flush_interval,
            poll_interval: self.poll_interval.unwrap_or(flush_interval),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            backoff: BackoffPolicy {
                base: self.backoff_base.unwrap_or(DEFAULT_BACKOFF_BASE),
                cap: self.backoff_cap.unwrap_or(DEFAULT_BACKOFF_CAP),
                max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            },
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            degraded_cooldown: self.degraded_cooldown.unwrap_or(defaults.degraded_cooldown),
            capacity: self.capacity.unwrap_or(defaults.capacity),
            overflow_policy: self.overflow_policy.unwrap_or(defaults.overflow_policy),
            drop_report_threshold: self
                .drop_report_threshold
                .unwrap_or(defaults.drop_report_threshold),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: value.to_owned(),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
