//! `ureq`-backed transport.
//!
//! The agent keeps a connection pool across batches. Connect and request
//! timeouts are applied at the agent level so every call is bounded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use thiserror::Error;
use ureq::{Agent, AgentBuilder};

use crate::log_record::LogRecord;

use super::{
    APP_INGEST_PATH, Credential, CredentialProvider, DeliveryOutcome, Endpoint, Transport,
    serialise::serialise_batch,
};

/// Default timeout for establishing connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default bound on a whole request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest response body quoted in a rejection reason.
const MAX_REASON_LEN: usize = 256;

/// Errors raised while constructing a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to initialise TLS: {0}")]
    Tls(#[from] native_tls::Error),
}

/// Settings for [`HttpTransport`].
#[derive(Clone)]
pub struct HttpTransportConfig {
    pub endpoint: Endpoint,
    pub credentials: Option<Arc<dyn CredentialProvider>>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            credentials: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            headers: Vec::new(),
        }
    }
}

impl std::fmt::Debug for HttpTransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransportConfig")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Transport posting JSON batches with `ureq`.
pub struct HttpTransport {
    config: HttpTransportConfig,
    agent: Agent,
    cached: Option<Credential>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let tls = native_tls::TlsConnector::new()?;
        let agent = AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout(config.request_timeout)
            .tls_connector(Arc::new(tls))
            .build();
        Ok(Self {
            config,
            agent,
            cached: None,
        })
    }

    /// Return the cached credential, fetching one when absent or expired.
    fn current_credential(&mut self) -> Option<Result<Credential, super::AuthError>> {
        let provider = self.config.credentials.as_ref()?;
        if let Some(cred) = &self.cached
            && !cred.is_expired(Utc::now())
        {
            return Some(Ok(cred.clone()));
        }
        let fetched = provider.credential();
        if let Ok(cred) = &fetched {
            self.cached = Some(cred.clone());
        }
        Some(fetched)
    }

    fn execute_request(
        &self,
        credential: Option<&Credential>,
        payload: &str,
    ) -> Result<ureq::Response, Box<ureq::Error>> {
        let path = credential.map_or(APP_INGEST_PATH, Credential::ingest_path);
        let url = self.config.endpoint.url_for(path);
        let mut req = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json");
        if let Some(cred) = credential {
            for (name, value) in cred.headers() {
                req = req.set(name, &value);
            }
        }
        for (name, value) in &self.config.headers {
            req = req.set(name, value);
        }
        req.send_string(payload).map_err(Box::new)
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, service: &str, records: &[LogRecord]) -> DeliveryOutcome {
        let payload = match serialise_batch(service, records) {
            Ok(p) => p,
            Err(err) => {
                return DeliveryOutcome::ClientFailure {
                    status: None,
                    reason: format!("serialisation error: {err}"),
                };
            }
        };

        let credential = match self.current_credential() {
            None => None,
            Some(Ok(cred)) => Some(cred),
            Some(Err(err)) => {
                warn!("jarvis_log_client transport: {err}");
                return DeliveryOutcome::AuthFailure;
            }
        };

        let outcome = match self.execute_request(credential.as_ref(), &payload) {
            Ok(response) => classify_status(response.status(), String::new()),
            Err(err) => match *err {
                ureq::Error::Status(code, response) => {
                    let body = response.into_string().unwrap_or_default();
                    classify_status(code, truncate_reason(body))
                }
                ureq::Error::Transport(transport_err) => {
                    DeliveryOutcome::RetryableFailure(transport_err.to_string())
                }
            },
        };
        if outcome == DeliveryOutcome::AuthFailure {
            self.cached = None;
        }
        outcome
    }

    fn refresh_credentials(&mut self) -> bool {
        let Some(provider) = self.config.credentials.as_ref() else {
            return false;
        };
        match provider.refresh() {
            Ok(cred) => {
                debug!("jarvis_log_client transport: credential refreshed");
                self.cached = Some(cred);
                true
            }
            Err(err) => {
                warn!("jarvis_log_client transport: {err}");
                self.cached = None;
                false
            }
        }
    }
}

/// Classifies an HTTP status code.
///
/// * **2xx** → [`DeliveryOutcome::Success`]
/// * **401** → [`DeliveryOutcome::AuthFailure`]
/// * **5xx** → [`DeliveryOutcome::RetryableFailure`]
/// * **Other** → [`DeliveryOutcome::ClientFailure`]
pub fn classify_status(status: u16, body: String) -> DeliveryOutcome {
    match status {
        200..=299 => DeliveryOutcome::Success,
        401 => DeliveryOutcome::AuthFailure,
        500..=599 => DeliveryOutcome::RetryableFailure(format!("server returned {status}")),
        _ => DeliveryOutcome::ClientFailure {
            status: Some(status),
            reason: if body.is_empty() {
                format!("server returned {status}")
            } else {
                body
            },
        },
    }
}

fn truncate_reason(mut body: String) -> String {
    if body.len() > MAX_REASON_LEN {
        let mut cut = MAX_REASON_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body.trim().to_owned()
}
