//! OAuth2 authorization code flow with PKCE, end to end
//!
//! The orchestrator ties the leaf modules together for one authorization
//! attempt:
//!
//! 1. Ensure the self-signed credential material exists (warning-only).
//! 2. Generate the PKCE verifier/challenge pair.
//! 3. Build the authorization URL with a fixed parameter order.
//! 4. Start the loopback listener, then open the user's browser.
//! 5. Await the redirect outcome and exchange the code for a token.
//! 6. Fetch one page of saved tracks and stop the listener.
//!
//! State machine: `Initializing -> AwaitingRedirect -> ExchangingToken ->
//! FetchingResource -> Completed`, with an absorbing `Errored` state.  Every
//! failure is terminal for the flow instance; retrying requires a new flow.
//! All external completions (the listener's redirect, both HTTP calls) arrive
//! as awaited messages on this single task, so flow state is never mutated
//! concurrently.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use crate::auth::client::{AuthHttpClient, SavedTracksPage};
use crate::auth::credentials::CredentialStore;
use crate::auth::listener::{AuthorizationResult, LoopbackAuthListener};
use crate::auth::pkce::{PkcePair, DEFAULT_VERIFIER_LENGTH};
use crate::error::{Result, TrackvaultError};

// ---------------------------------------------------------------------------
// UrlLauncher
// ---------------------------------------------------------------------------

/// Capability for opening a URL in the user's environment.
///
/// Injected into the flow so tests can record the launched URL instead of
/// invoking the OS.  Launch failure is never fatal: the flow keeps waiting on
/// the listener so the user can navigate to the printed URL manually.
pub trait UrlLauncher: Send + Sync {
    /// Opens `url` in the user's default browser (or equivalent).
    fn open(&self, url: &str) -> Result<()>;
}

/// Production launcher backed by the system default browser.
pub struct SystemUrlLauncher;

impl UrlLauncher for SystemUrlLauncher {
    fn open(&self, url: &str) -> Result<()> {
        webbrowser::open(url)
            .map_err(|e| TrackvaultError::BrowserLaunchFailure(e.to_string()))?;
        Ok(())
    }
}

/// Launcher that never opens anything; used with `--no-browser` where the
/// user copies the printed URL themselves.
pub struct NullUrlLauncher;

impl UrlLauncher for NullUrlLauncher {
    fn open(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FlowState
// ---------------------------------------------------------------------------

/// Lifecycle states of one authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Credentials and PKCE material being prepared.
    Initializing,
    /// Listener bound, browser launched, waiting for the provider redirect.
    AwaitingRedirect,
    /// Authorization code received, token exchange in progress.
    ExchangingToken,
    /// Access token acquired, saved-tracks fetch in progress.
    FetchingResource,
    /// Terminal success.
    Completed,
    /// Terminal failure, reachable from `AwaitingRedirect` and
    /// `ExchangingToken` (and from a failed resource fetch).
    Errored,
}

// ---------------------------------------------------------------------------
// AuthFlowConfig
// ---------------------------------------------------------------------------

/// Configuration for a single authorization attempt.
///
/// All provider-facing values are supplied at construction; nothing is
/// hardcoded in the flow itself.
#[derive(Debug, Clone)]
pub struct AuthFlowConfig {
    /// OAuth client identifier registered with the provider.
    pub client_id: String,

    /// Reserved configuration.  The PKCE token exchange never transmits it;
    /// retained for providers that may require a confidential client.
    pub client_secret: Option<String>,

    /// Loopback redirect URI the provider sends the browser back to.
    pub redirect_uri: Url,

    /// Space-separated scopes to request.
    pub scope: String,

    /// Base URL of the provider's accounts host (authorization and token
    /// endpoints).
    pub accounts_base_url: String,

    /// Base URL of the provider's API host (resource endpoint).
    pub api_base_url: String,

    /// Saved-tracks page size.
    pub limit: u32,

    /// Saved-tracks page offset.
    pub offset: u32,

    /// Identity the self-signed certificate is bound to.
    pub issuer: String,

    /// Path of the persisted private key.
    pub key_path: PathBuf,

    /// Path of the persisted self-signed certificate.
    pub cert_path: PathBuf,
}

// ---------------------------------------------------------------------------
// AuthorizationFlow
// ---------------------------------------------------------------------------

/// Drives one complete browser-based PKCE authorization attempt.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use trackvault::auth::flow::{AuthFlowConfig, AuthorizationFlow, SystemUrlLauncher};
///
/// # async fn example(config: AuthFlowConfig) -> trackvault::error::Result<()> {
/// let mut flow = AuthorizationFlow::new(
///     Arc::new(reqwest::Client::new()),
///     config,
///     Arc::new(SystemUrlLauncher),
/// );
/// let page = flow.run(&CancellationToken::new()).await?;
/// println!("fetched {} saved tracks", page.items.len());
/// # Ok(())
/// # }
/// ```
pub struct AuthorizationFlow {
    config: AuthFlowConfig,
    client: AuthHttpClient,
    launcher: Arc<dyn UrlLauncher>,
    state: FlowState,
}

impl AuthorizationFlow {
    /// Creates a flow for the given configuration and launcher capability.
    pub fn new(
        http: Arc<reqwest::Client>,
        config: AuthFlowConfig,
        launcher: Arc<dyn UrlLauncher>,
    ) -> Self {
        let client = AuthHttpClient::new(
            http,
            config.accounts_base_url.clone(),
            config.api_base_url.clone(),
            config.client_id.clone(),
            config.redirect_uri.to_string(),
        );
        Self {
            config,
            client,
            launcher,
            state: FlowState::Initializing,
        }
    }

    /// Current flow state.
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Runs the full authorization attempt.
    ///
    /// The redirect wait and both HTTP calls are raced against the `cancel`
    /// token; cancellation stops the listener and returns
    /// [`TrackvaultError::Cancelled`].  Without cancellation there is no
    /// timeout anywhere in the flow.
    ///
    /// # Errors
    ///
    /// Any error is terminal for this flow instance; see the crate error
    /// taxonomy.  The listener is stopped exactly once on every terminal
    /// path, success or failure.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<SavedTracksPage> {
        self.state = FlowState::Initializing;

        // Step 1: credential material, warning-only.  The listener binds
        // plain HTTP on the loopback interface; this material is maintained
        // for local TLS readiness.
        match CredentialStore::ensure(
            &self.config.key_path,
            &self.config.cert_path,
            &self.config.issuer,
        ) {
            Ok(_) => {}
            Err(e) => warn!(error = %e, "credential material unavailable, continuing"),
        }

        // Step 2: PKCE pair, created once and held for this attempt only.
        let pkce = PkcePair::generate(DEFAULT_VERIFIER_LENGTH)?;

        // Step 3: authorization URL with the fixed parameter order.
        let auth_url = self.build_authorization_url(&pkce.challenge)?;

        // Step 4: listener first, then the browser side effect.
        let mut listener = LoopbackAuthListener::new();
        let redirect_rx = match listener.start(&self.config.redirect_uri).await {
            Ok(rx) => rx,
            Err(e) => {
                self.state = FlowState::Errored;
                return Err(e);
            }
        };
        self.state = FlowState::AwaitingRedirect;

        info!(url = %auth_url, "opening provider authorization page");
        if let Err(e) = self.launcher.open(auth_url.as_str()) {
            // Fire-and-forget side effect: report and keep waiting, the user
            // may navigate manually.
            warn!(error = %e, url = %auth_url, "browser launch failed, navigate manually");
        }

        // Step 5: await the redirect outcome.
        let result = tokio::select! {
            result = redirect_rx => result,
            _ = cancel.cancelled() => {
                listener.stop();
                self.state = FlowState::Errored;
                return Err(TrackvaultError::Cancelled.into());
            }
        };
        let result = match result {
            Ok(result) => result,
            Err(_) => {
                listener.stop();
                self.state = FlowState::Errored;
                return Err(TrackvaultError::Listener(
                    "listener task ended before delivering a result".to_string(),
                )
                .into());
            }
        };

        let code = match result {
            AuthorizationResult::Code(code) => code,
            AuthorizationResult::Error(e) => {
                error!(error = %e, "provider denied authorization");
                listener.stop();
                self.state = FlowState::Errored;
                return Err(TrackvaultError::ProviderDeniedAuthorization(e).into());
            }
        };

        // Step 6: token exchange.  The verifier must be the one whose
        // challenge was sent in the authorization URL.
        self.state = FlowState::ExchangingToken;
        let token = tokio::select! {
            token = self.client.exchange_code(&code, &pkce.verifier) => token,
            _ = cancel.cancelled() => {
                listener.stop();
                self.state = FlowState::Errored;
                return Err(TrackvaultError::Cancelled.into());
            }
        };
        let token = match token {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "token exchange failed");
                listener.stop();
                self.state = FlowState::Errored;
                return Err(e);
            }
        };

        // Step 7: one resource fetch; stopping the listener afterwards is
        // the single terminal transition, taken on success and failure both.
        self.state = FlowState::FetchingResource;
        let page = tokio::select! {
            page = self.client.fetch_saved_tracks(
                &token.access_token,
                self.config.limit,
                self.config.offset,
            ) => page,
            _ = cancel.cancelled() => {
                listener.stop();
                self.state = FlowState::Errored;
                return Err(TrackvaultError::Cancelled.into());
            }
        };

        listener.stop();

        match page {
            Ok(page) => {
                self.state = FlowState::Completed;
                info!(items = page.items.len(), "authorization flow completed");
                Ok(page)
            }
            Err(e) => {
                error!(error = %e, "saved tracks fetch failed");
                self.state = FlowState::Errored;
                Err(e)
            }
        }
    }

    /// Builds the authorization URL.
    ///
    /// Parameter order is fixed: `response_type`, `client_id`, `scope`,
    /// `code_challenge_method`, `code_challenge`, `redirect_uri`.  Tests
    /// depend on the constructed URL being reproducible.
    fn build_authorization_url(&self, code_challenge: &str) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/authorize",
            self.config.accounts_base_url.trim_end_matches('/')
        ))
        .map_err(|e| TrackvaultError::Config(format!("invalid accounts base URL: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("scope", &self.config.scope);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("code_challenge", code_challenge);
            query.append_pair("redirect_uri", self.config.redirect_uri.as_str());
        }

        Ok(url)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
