//! Authenticated HTTP delivery of record batches.
//!
//! [`HttpTransport`] serialises one batch, attaches the current credential,
//! issues a single request bounded by `request_timeout`, and classifies the
//! result. It never retries; retry and fallback policy live in the
//! dispatcher.
//!
//! # Outcome classification
//!
//! - **2xx**: [`DeliveryOutcome::Success`].
//! - **401**: [`DeliveryOutcome::AuthFailure`]; the cached credential is
//!   dropped.
//! - **5xx** and network errors: [`DeliveryOutcome::RetryableFailure`].
//! - **Other statuses** (4xx besides 401, unfollowed 3xx):
//!   [`DeliveryOutcome::ClientFailure`].

mod auth;
mod client;
mod endpoint;
mod serialise;

#[cfg(test)]
mod tests;

use std::fmt;

use crate::log_record::LogRecord;

pub use auth::{
    APP_INGEST_PATH, AuthError, AuthScheme, Credential, CredentialProvider, NODE_INGEST_PATH,
    StaticCredentials,
};
pub use client::{HttpTransport, HttpTransportConfig, TransportError, classify_status};
pub use endpoint::{DEFAULT_LOGS_URL, Endpoint, LOGS_SERVICE_NAME, ServiceDiscovery};
pub use serialise::serialise_batch;

/// Classified result of one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success,
    AuthFailure,
    RetryableFailure(String),
    ClientFailure { status: Option<u16>, reason: String },
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::AuthFailure => f.write_str("authentication rejected"),
            Self::RetryableFailure(reason) => write!(f, "retryable failure: {reason}"),
            Self::ClientFailure {
                status: Some(status),
                reason,
            } => write!(f, "rejected with status {status}: {reason}"),
            Self::ClientFailure {
                status: None,
                reason,
            } => write!(f, "rejected: {reason}"),
        }
    }
}

/// One-shot batch sender driven by the dispatcher.
///
/// Implementations are owned by the single dispatcher thread, so `send` and
/// `refresh_credentials` are never called concurrently.
pub trait Transport: Send {
    /// Attempt delivery of `records`, all belonging to `service`.
    fn send(&mut self, service: &str, records: &[LogRecord]) -> DeliveryOutcome;

    /// Ask the credential collaborator for a fresh credential.
    ///
    /// Returns `false` if no refresh could be obtained.
    fn refresh_credentials(&mut self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, service: &str, records: &[LogRecord]) -> DeliveryOutcome {
        (**self).send(service, records)
    }

    fn refresh_credentials(&mut self) -> bool {
        (**self).refresh_credentials()
    }
}
