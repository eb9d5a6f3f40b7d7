//! End-to-end authorization flow integration tests using wiremock
//!
//! Drives `AuthorizationFlow::run` against mock token and resource endpoints,
//! with a launcher double standing in for the browser: when the flow opens
//! the authorization URL, a background task plays the provider's part by
//! issuing the redirect GET against the loopback listener.
//!
//! Covered:
//!
//! - The happy path chains code -> token -> saved tracks, and the resource
//!   request carries `Authorization: Bearer <token>`.
//! - A 200 token response without `access_token` surfaces as
//!   `TokenFieldMissing` and the resource endpoint is never called.
//! - A provider `error` redirect aborts before any token exchange.
//! - Cancellation while awaiting the redirect returns `Cancelled`.

use std::net::TcpListener as StdTcpListener;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trackvault::auth::flow::{
    AuthFlowConfig, AuthorizationFlow, FlowState, NullUrlLauncher, UrlLauncher,
};
use trackvault::error::Result;
use trackvault::TrackvaultError;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Launcher double that hands the authorization URL to the test's fake
/// browser task instead of invoking the OS.
struct ChannelLauncher {
    tx: Mutex<Option<tokio::sync::oneshot::Sender<String>>>,
}

impl ChannelLauncher {
    fn new() -> (Arc<Self>, tokio::sync::oneshot::Receiver<String>) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }
}

impl UrlLauncher for ChannelLauncher {
    fn open(&self, url: &str) -> Result<()> {
        if let Some(tx) = self.tx.lock().unwrap().take() {
            let _ = tx.send(url.to_string());
        }
        Ok(())
    }
}

/// Picks a free loopback port by binding an ephemeral socket and dropping it.
fn free_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("ephemeral bind");
    listener.local_addr().expect("local addr").port()
}

/// Builds a flow config whose provider endpoints point at the mock server and
/// whose redirect URI targets the given loopback port.  Credential material
/// lands in a temp directory so tests never touch the real data directory.
fn make_flow_config(server_url: &str, port: u16, creds_dir: &tempfile::TempDir) -> AuthFlowConfig {
    AuthFlowConfig {
        client_id: "test-client-id".to_string(),
        client_secret: None,
        redirect_uri: Url::parse(&format!("http://127.0.0.1:{port}/callback"))
            .expect("valid redirect URI"),
        scope: "user-library-read".to_string(),
        accounts_base_url: server_url.to_string(),
        api_base_url: server_url.to_string(),
        limit: 20,
        offset: 0,
        issuer: "Trackvault".to_string(),
        key_path: creds_dir.path().join("key.pem"),
        cert_path: creds_dir.path().join("cert.pem"),
    }
}

fn saved_tracks_body() -> serde_json::Value {
    serde_json::json!({
        "items": [
            {"added_at": "2024-03-01T12:00:00Z", "track": {"name": "First Song"}},
            {"added_at": "2024-03-02T12:00:00Z", "track": {"name": "Second Song"}}
        ],
        "total": 2
    })
}

/// Spawns the fake browser: waits for the launcher to surface the
/// authorization URL, then issues the provider redirect against the loopback
/// listener.
fn spawn_browser(
    rx: tokio::sync::oneshot::Receiver<String>,
    callback_url: String,
) -> tokio::task::JoinHandle<String> {
    tokio::spawn(async move {
        let auth_url = rx.await.expect("launcher must surface the auth URL");
        reqwest::get(&callback_url)
            .await
            .expect("callback GET must reach the listener");
        auth_url
    })
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

/// The full chain: redirect code -> token exchange -> bearer-authenticated
/// saved-tracks fetch.  The resource request must carry the token from the
/// exchange, verbatim, as a Bearer header.
#[tokio::test]
async fn test_flow_completes_and_sends_bearer_token() {
    let server = MockServer::start().await;
    let creds_dir = tempfile::tempdir().expect("tempdir");
    let port = free_port();

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=test_code_123"))
        .and(body_string_contains("code_verifier="))
        .and(body_string_contains("client_id=test-client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok1",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/me/tracks"))
        .and(header("authorization", "Bearer tok1"))
        .and(query_param("limit", "20"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(saved_tracks_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (launcher, rx) = ChannelLauncher::new();
    let browser = spawn_browser(
        rx,
        format!("http://127.0.0.1:{port}/callback?code=test_code_123"),
    );

    let mut flow = AuthorizationFlow::new(
        Arc::new(reqwest::Client::new()),
        make_flow_config(&server.uri(), port, &creds_dir),
        launcher,
    );
    let page = flow
        .run(&CancellationToken::new())
        .await
        .expect("flow must complete");

    assert_eq!(flow.state(), FlowState::Completed);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, Some(2));
    assert_eq!(page.items[0].track["name"], "First Song");

    // The launched authorization URL must carry the PKCE challenge and the
    // fixed parameter set.
    let auth_url = browser.await.expect("browser task");
    assert!(auth_url.contains("response_type=code"));
    assert!(auth_url.contains("code_challenge_method=S256"));
    assert!(auth_url.contains("code_challenge="));
    assert!(auth_url.contains("client_id=test-client-id"));

    server.verify().await;
}

// ---------------------------------------------------------------------------
// Token response without access_token
// ---------------------------------------------------------------------------

/// A transport-successful token response that carries no `access_token` must
/// surface as the distinct `TokenFieldMissing` error, and the resource
/// endpoint must never be called.
#[tokio::test]
async fn test_missing_access_token_is_distinct_and_skips_resource_fetch() {
    let server = MockServer::start().await;
    let creds_dir = tempfile::tempdir().expect("tempdir");
    let port = free_port();

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/me/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(saved_tracks_body()))
        .expect(0)
        .mount(&server)
        .await;

    let (launcher, rx) = ChannelLauncher::new();
    let _browser = spawn_browser(rx, format!("http://127.0.0.1:{port}/callback?code=abc"));

    let mut flow = AuthorizationFlow::new(
        Arc::new(reqwest::Client::new()),
        make_flow_config(&server.uri(), port, &creds_dir),
        launcher,
    );
    let err = flow
        .run(&CancellationToken::new())
        .await
        .expect_err("flow must fail when access_token is absent");

    assert!(
        matches!(
            err.downcast_ref::<TrackvaultError>(),
            Some(TrackvaultError::TokenFieldMissing)
        ),
        "expected TokenFieldMissing, got: {err}"
    );
    assert_eq!(flow.state(), FlowState::Errored);

    server.verify().await;
}

// ---------------------------------------------------------------------------
// Provider denies authorization
// ---------------------------------------------------------------------------

/// An `error` query parameter on the redirect aborts the flow before any
/// token exchange is attempted.
#[tokio::test]
async fn test_provider_denial_aborts_before_token_exchange() {
    let server = MockServer::start().await;
    let creds_dir = tempfile::tempdir().expect("tempdir");
    let port = free_port();

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "never-used"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let (launcher, rx) = ChannelLauncher::new();
    let _browser = spawn_browser(
        rx,
        format!("http://127.0.0.1:{port}/callback?error=access_denied"),
    );

    let mut flow = AuthorizationFlow::new(
        Arc::new(reqwest::Client::new()),
        make_flow_config(&server.uri(), port, &creds_dir),
        launcher,
    );
    let err = flow
        .run(&CancellationToken::new())
        .await
        .expect_err("flow must fail on provider denial");

    match err.downcast_ref::<TrackvaultError>() {
        Some(TrackvaultError::ProviderDeniedAuthorization(reason)) => {
            assert_eq!(reason, "access_denied");
        }
        other => panic!("expected ProviderDeniedAuthorization, got: {other:?}"),
    }
    assert_eq!(flow.state(), FlowState::Errored);

    server.verify().await;
}

// ---------------------------------------------------------------------------
// Token endpoint transport failure
// ---------------------------------------------------------------------------

/// A non-success token endpoint status is a transport-level failure, distinct
/// from the missing-field condition.
#[tokio::test]
async fn test_token_endpoint_400_is_transport_failure() {
    let server = MockServer::start().await;
    let creds_dir = tempfile::tempdir().expect("tempdir");
    let port = free_port();

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (launcher, rx) = ChannelLauncher::new();
    let _browser = spawn_browser(rx, format!("http://127.0.0.1:{port}/callback?code=stale"));

    let mut flow = AuthorizationFlow::new(
        Arc::new(reqwest::Client::new()),
        make_flow_config(&server.uri(), port, &creds_dir),
        launcher,
    );
    let err = flow
        .run(&CancellationToken::new())
        .await
        .expect_err("flow must fail on a 400 token response");

    match err.downcast_ref::<TrackvaultError>() {
        Some(TrackvaultError::TokenExchangeTransport(msg)) => {
            assert!(msg.contains("400"), "message should carry the status: {msg}");
        }
        other => panic!("expected TokenExchangeTransport, got: {other:?}"),
    }

    server.verify().await;
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cancelling while the flow awaits the redirect stops the listener and
/// returns `Cancelled` without any provider traffic.
#[tokio::test]
async fn test_cancellation_while_awaiting_redirect() {
    let server = MockServer::start().await;
    let creds_dir = tempfile::tempdir().expect("tempdir");
    let port = free_port();

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let mut flow = AuthorizationFlow::new(
        Arc::new(reqwest::Client::new()),
        make_flow_config(&server.uri(), port, &creds_dir),
        Arc::new(NullUrlLauncher),
    );
    let err = flow
        .run(&cancel)
        .await
        .expect_err("flow must fail when cancelled");

    assert!(
        matches!(
            err.downcast_ref::<TrackvaultError>(),
            Some(TrackvaultError::Cancelled)
        ),
        "expected Cancelled, got: {err}"
    );
    assert_eq!(flow.state(), FlowState::Errored);

    // The listener must have been released: the redirect port binds again.
    // The background task drops the socket shortly after stop(), so poll.
    let mut rebound = false;
    for _ in 0..50 {
        if StdTcpListener::bind(("127.0.0.1", port)).is_ok() {
            rebound = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(rebound, "redirect port must be free after cancel");
}
