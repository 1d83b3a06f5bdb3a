//! Credentials attached to each batch request.
//!
//! Acquisition and refresh belong to an external collaborator implementing
//! [`CredentialProvider`]. The transport caches the credential it receives
//! until it expires or a 401 response invalidates it.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Ingest path used for service (app and bearer) credentials.
pub const APP_INGEST_PATH: &str = "/api/v0/logs/batch";
/// Ingest path used for node credentials.
pub const NODE_INGEST_PATH: &str = "/api/v0/node/logs/batch";

/// Errors raised while acquiring credentials.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The provider failed to obtain or refresh a credential.
    #[error("credential refresh failed: {0}")]
    Refresh(String),
}

/// How a credential is presented on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// `X-Jarvis-App-Id` / `X-Jarvis-App-Key` header pair.
    AppKey,
    /// `X-Node-Id` / `X-Node-Key` header pair, posted to the node endpoint.
    NodeKey,
}

/// Credential presented with every batch.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub app_id: String,
    pub bearer_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scheme: AuthScheme,
}

impl Credential {
    pub fn bearer(app_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            bearer_token: token.into(),
            expires_at: None,
            scheme: AuthScheme::Bearer,
        }
    }

    pub fn app(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            bearer_token: app_key.into(),
            expires_at: None,
            scheme: AuthScheme::AppKey,
        }
    }

    pub fn node(node_id: impl Into<String>, node_key: impl Into<String>) -> Self {
        Self {
            app_id: node_id.into(),
            bearer_token: node_key.into(),
            expires_at: None,
            scheme: AuthScheme::NodeKey,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Headers carrying this credential.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self.scheme {
            AuthScheme::Bearer => {
                vec![("Authorization", format!("Bearer {}", self.bearer_token))]
            }
            AuthScheme::AppKey => vec![
                ("X-Jarvis-App-Id", self.app_id.clone()),
                ("X-Jarvis-App-Key", self.bearer_token.clone()),
            ],
            AuthScheme::NodeKey => vec![
                ("X-Node-Id", self.app_id.clone()),
                ("X-Node-Key", self.bearer_token.clone()),
            ],
        }
    }

    /// Path the batch is posted to for this credential's scheme.
    pub fn ingest_path(&self) -> &'static str {
        match self.scheme {
            AuthScheme::NodeKey => NODE_INGEST_PATH,
            AuthScheme::Bearer | AuthScheme::AppKey => APP_INGEST_PATH,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("app_id", &self.app_id)
            .field("bearer_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Source of credentials, supplied by the host application.
pub trait CredentialProvider: Send + Sync {
    /// Return a currently valid credential.
    fn credential(&self) -> Result<Credential, AuthError>;

    /// Obtain a fresh credential after the server rejected the cached one.
    fn refresh(&self) -> Result<Credential, AuthError> {
        self.credential()
    }
}

/// Provider handing out one fixed credential.
#[derive(Clone, Debug)]
pub struct StaticCredentials {
    credential: Credential,
}

impl StaticCredentials {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl CredentialProvider for StaticCredentials {
    fn credential(&self) -> Result<Credential, AuthError> {
        Ok(self.credential.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn app_credentials_use_jarvis_headers() {
        let cred = Credential::app("my-app", "my-key");
        assert_eq!(
            cred.headers(),
            vec![
                ("X-Jarvis-App-Id", "my-app".to_owned()),
                ("X-Jarvis-App-Key", "my-key".to_owned()),
            ]
        );
        assert_eq!(cred.ingest_path(), APP_INGEST_PATH);
    }

    #[test]
    fn node_credentials_use_node_endpoint() {
        let cred = Credential::node("kitchen-pi", "secret");
        assert_eq!(cred.headers()[0], ("X-Node-Id", "kitchen-pi".to_owned()));
        assert_eq!(cred.ingest_path(), NODE_INGEST_PATH);
    }

    #[test]
    fn bearer_uses_authorization_header() {
        let cred = Credential::bearer("svc", "tok");
        assert_eq!(cred.headers(), vec![("Authorization", "Bearer tok".to_owned())]);
    }

    #[test]
    fn expiry_is_checked_against_now() {
        let now = Utc::now();
        let cred = Credential::bearer("svc", "tok").expiring_at(now - Duration::seconds(1));
        assert!(cred.is_expired(now));
        assert!(!Credential::bearer("svc", "tok").is_expired(now));
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", Credential::app("id", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
