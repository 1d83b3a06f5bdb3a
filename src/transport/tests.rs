//! Integration tests for the HTTP transport against an in-process server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use rstest::rstest;

use super::*;
use crate::test_utils::http_server::{closed_port, serve};
use crate::{context::Context, level::Level};

const WAIT: Duration = Duration::from_secs(5);

fn transport_for(addr: SocketAddr, credentials: Option<Arc<dyn CredentialProvider>>) -> HttpTransport {
    HttpTransport::new(HttpTransportConfig {
        endpoint: Endpoint::Fixed(format!("http://{addr}")),
        credentials,
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
        headers: Vec::new(),
    })
    .expect("build transport")
}

fn batch(messages: &[&str]) -> Vec<LogRecord> {
    messages
        .iter()
        .map(|m| LogRecord::new("svc", Level::Info, m, Context::new().with("k", "v")))
        .collect()
}

/// Provider counting refreshes and handing out a new token each time.
#[derive(Default)]
struct RotatingCredentials {
    refreshes: AtomicUsize,
}

impl CredentialProvider for RotatingCredentials {
    fn credential(&self) -> Result<Credential, AuthError> {
        let n = self.refreshes.load(Ordering::SeqCst);
        Ok(Credential::bearer("svc", format!("token-{n}")))
    }

    fn refresh(&self) -> Result<Credential, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.credential()
    }
}

#[rstest]
fn posts_json_batch_with_app_headers() {
    let (addr, rx) = serve(vec![(200, "")]);
    let creds: Arc<dyn CredentialProvider> =
        Arc::new(StaticCredentials::new(Credential::app("my-app", "my-key")));
    let mut transport = transport_for(addr, Some(creds));

    let outcome = transport.send("svc", &batch(&["hello", "world"]));
    assert_eq!(outcome, DeliveryOutcome::Success);

    let captured = rx.recv_timeout(WAIT).expect("request");
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.path, APP_INGEST_PATH);
    assert_eq!(captured.header("content-type"), Some("application/json"));
    assert_eq!(captured.header("x-jarvis-app-id"), Some("my-app"));
    assert_eq!(captured.header("x-jarvis-app-key"), Some("my-key"));

    let body = captured.json();
    assert_eq!(body["service"], "svc");
    assert_eq!(body["records"][0]["message"], "hello");
    assert_eq!(body["records"][1]["message"], "world");
    assert_eq!(body["records"][0]["level"], "INFO");
    assert_eq!(body["records"][0]["context"]["k"], "v");
}

#[rstest]
fn node_credentials_post_to_node_endpoint() {
    let (addr, rx) = serve(vec![(204, "")]);
    let creds: Arc<dyn CredentialProvider> =
        Arc::new(StaticCredentials::new(Credential::node("kitchen-pi", "k")));
    let mut transport = transport_for(addr, Some(creds));

    assert_eq!(transport.send("svc", &batch(&["n"])), DeliveryOutcome::Success);
    let captured = rx.recv_timeout(WAIT).expect("request");
    assert_eq!(captured.path, NODE_INGEST_PATH);
    assert_eq!(captured.header("x-node-id"), Some("kitchen-pi"));
}

#[rstest]
fn sends_without_auth_when_unconfigured() {
    let (addr, rx) = serve(vec![(200, "")]);
    let mut transport = transport_for(addr, None);
    assert_eq!(transport.send("svc", &batch(&["anon"])), DeliveryOutcome::Success);
    let captured = rx.recv_timeout(WAIT).expect("request");
    assert!(captured.header("authorization").is_none());
    assert!(captured.header("x-jarvis-app-id").is_none());
    assert!(!transport.refresh_credentials());
}

#[rstest]
fn unauthorised_then_refreshed_token_is_used() {
    let (addr, rx) = serve(vec![(401, ""), (200, "")]);
    let provider = Arc::new(RotatingCredentials::default());
    let mut transport = transport_for(addr, Some(provider.clone()));

    assert_eq!(transport.send("svc", &batch(&["a"])), DeliveryOutcome::AuthFailure);
    assert!(transport.refresh_credentials());
    assert_eq!(transport.send("svc", &batch(&["a"])), DeliveryOutcome::Success);

    let first = rx.recv_timeout(WAIT).expect("first");
    let second = rx.recv_timeout(WAIT).expect("second");
    assert_eq!(first.header("authorization"), Some("Bearer token-0"));
    assert_eq!(second.header("authorization"), Some("Bearer token-1"));
    assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
}

/// Provider counting how often the transport asks for a credential.
struct CountingCredentials {
    fetches: AtomicUsize,
    expired: bool,
}

impl CountingCredentials {
    fn new(expired: bool) -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
            expired,
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for CountingCredentials {
    fn credential(&self) -> Result<Credential, AuthError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        let credential = Credential::bearer("svc", format!("token-{n}"));
        if self.expired {
            return Ok(credential.expiring_at(Utc::now() - chrono::Duration::seconds(60)));
        }
        Ok(credential.expiring_at(Utc::now() + chrono::Duration::hours(1)))
    }

    fn refresh(&self) -> Result<Credential, AuthError> {
        Err(AuthError::Refresh("identity service unreachable".into()))
    }
}

#[rstest]
fn valid_credential_is_fetched_once() {
    let (addr, rx) = serve(vec![(200, ""), (200, "")]);
    let provider = CountingCredentials::new(false);
    let mut transport = transport_for(addr, Some(provider.clone()));

    assert_eq!(transport.send("svc", &batch(&["a"])), DeliveryOutcome::Success);
    assert_eq!(transport.send("svc", &batch(&["b"])), DeliveryOutcome::Success);

    assert_eq!(provider.fetches(), 1);
    let second = rx.iter().nth(1).expect("second request");
    assert_eq!(second.header("authorization"), Some("Bearer token-0"));
}

#[rstest]
fn expired_credential_is_fetched_again() {
    let (addr, rx) = serve(vec![(200, ""), (200, "")]);
    let provider = CountingCredentials::new(true);
    let mut transport = transport_for(addr, Some(provider.clone()));

    assert_eq!(transport.send("svc", &batch(&["a"])), DeliveryOutcome::Success);
    assert_eq!(transport.send("svc", &batch(&["b"])), DeliveryOutcome::Success);

    assert_eq!(provider.fetches(), 2);
    let second = rx.iter().nth(1).expect("second request");
    assert_eq!(second.header("authorization"), Some("Bearer token-1"));
}

#[rstest]
fn unauthorised_response_drops_cached_credential() {
    let (addr, rx) = serve(vec![(401, ""), (200, "")]);
    let provider = CountingCredentials::new(false);
    let mut transport = transport_for(addr, Some(provider.clone()));

    assert_eq!(transport.send("svc", &batch(&["a"])), DeliveryOutcome::AuthFailure);
    assert!(!transport.refresh_credentials());
    assert_eq!(transport.send("svc", &batch(&["a"])), DeliveryOutcome::Success);

    assert_eq!(provider.fetches(), 2);
    let second = rx.iter().nth(1).expect("second request");
    assert_eq!(second.header("authorization"), Some("Bearer token-1"));
}

#[rstest]
#[case::server_error(503, "")]
#[case::internal_error(500, "oops")]
fn server_errors_are_retryable(#[case] status: u16, #[case] body: &'static str) {
    let (addr, _rx) = serve(vec![(status, body)]);
    let mut transport = transport_for(addr, None);
    assert!(matches!(
        transport.send("svc", &batch(&["x"])),
        DeliveryOutcome::RetryableFailure(_)
    ));
}

#[rstest]
fn client_errors_carry_reason() {
    let (addr, _rx) = serve(vec![(400, "bad level field")]);
    let mut transport = transport_for(addr, None);
    assert_eq!(
        transport.send("svc", &batch(&["x"])),
        DeliveryOutcome::ClientFailure {
            status: Some(400),
            reason: "bad level field".into()
        }
    );
}

#[test]
fn connection_refused_is_retryable() {
    let mut transport = transport_for(closed_port(), None);
    assert!(matches!(
        transport.send("svc", &batch(&["x"])),
        DeliveryOutcome::RetryableFailure(_)
    ));
}

mod response_classification {
    use super::*;

    #[rstest]
    #[case(200, true, false, false)]
    #[case(204, true, false, false)]
    #[case(401, false, true, false)]
    #[case(500, false, false, true)]
    #[case(503, false, false, true)]
    fn status_classification(
        #[case] status: u16,
        #[case] success: bool,
        #[case] auth: bool,
        #[case] retryable: bool,
    ) {
        let outcome = classify_status(status, String::new());
        assert_eq!(outcome == DeliveryOutcome::Success, success);
        assert_eq!(outcome == DeliveryOutcome::AuthFailure, auth);
        assert_eq!(matches!(outcome, DeliveryOutcome::RetryableFailure(_)), retryable);
    }

    #[rstest]
    #[case(400)]
    #[case(403)]
    #[case(404)]
    #[case(413)]
    #[case(429)]
    fn other_client_statuses_are_client_failures(#[case] status: u16) {
        assert!(matches!(
            classify_status(status, String::new()),
            DeliveryOutcome::ClientFailure { status: Some(s), .. } if s == status
        ));
    }
}
