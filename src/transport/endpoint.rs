//! Resolution of the remote ingest URL.
//!
//! The base URL is either fixed at construction or looked up from a
//! service-discovery collaborator on every send, so runtime revisions take
//! effect without restarting the dispatcher.

use std::fmt;
use std::sync::Arc;

/// Default base URL for the log service.
pub const DEFAULT_LOGS_URL: &str = "http://localhost:8006";
/// Name under which the log service is registered for discovery.
pub const LOGS_SERVICE_NAME: &str = "jarvis-logs";

/// Service-discovery lookup supplied by the host application.
pub trait ServiceDiscovery: Send + Sync {
    /// Return the base URL currently registered for `service`, if any.
    fn service_url(&self, service: &str) -> Option<String>;
}

/// Where the transport finds its base URL.
#[derive(Clone)]
pub enum Endpoint {
    Fixed(String),
    Discovered {
        discovery: Arc<dyn ServiceDiscovery>,
        fallback: String,
    },
}

impl Endpoint {
    /// Current base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        let url = match self {
            Endpoint::Fixed(url) => url.clone(),
            Endpoint::Discovered {
                discovery,
                fallback,
            } => discovery
                .service_url(LOGS_SERVICE_NAME)
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| fallback.clone()),
        };
        url.trim_end_matches('/').to_owned()
    }

    /// Full ingest URL for `path`.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Fixed(DEFAULT_LOGS_URL.to_owned())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Fixed(url) => f.debug_tuple("Fixed").field(url).finish(),
            Endpoint::Discovered { fallback, .. } => f
                .debug_struct("Discovered")
                .field("fallback", fallback)
                .finish_non_exhaustive(),
        }
    }
}
