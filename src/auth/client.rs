//! Token exchange and saved-tracks resource clients
//!
//! Thin asynchronous wrappers around `reqwest` for the two provider calls the
//! authorization flow makes: exchanging the authorization code for an access
//! token (form-encoded POST) and fetching the user's saved tracks
//! (bearer-authenticated GET).
//!
//! A successful token exchange requires both transport-level success and the
//! presence of `access_token` in the decoded JSON; a 200 response without the
//! field is surfaced as the distinct [`TrackvaultError::TokenFieldMissing`]
//! condition rather than silently producing an empty token.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, TrackvaultError};

/// Provider-imposed maximum for the saved-tracks `limit` parameter.
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Default saved-tracks page size.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

// ---------------------------------------------------------------------------
// TokenResponse
// ---------------------------------------------------------------------------

/// The result of a successful authorization code exchange.
///
/// Held by the flow only as long as needed to authorize the resource call;
/// never persisted.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    /// The bearer access token issued by the provider.
    pub access_token: String,

    /// The full decoded token endpoint response, for callers that need
    /// fields beyond `access_token`.
    pub raw: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Saved tracks page
// ---------------------------------------------------------------------------

/// One entry of the saved-tracks collection per the provider's pagination
/// contract.  Inspected, not transformed.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedTrackItem {
    /// Timestamp at which the user saved the track.
    #[serde(default)]
    pub added_at: Option<String>,

    /// The track record itself, kept as opaque JSON.
    #[serde(default)]
    pub track: serde_json::Value,
}

/// One page of the downstream paginated collection.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedTracksPage {
    /// The `items` array of the response.
    #[serde(default)]
    pub items: Vec<SavedTrackItem>,

    /// Total number of saved tracks the provider reports, when present.
    #[serde(default)]
    pub total: Option<u64>,
}

// ---------------------------------------------------------------------------
// AuthHttpClient
// ---------------------------------------------------------------------------

/// Asynchronous HTTP client for the provider's token and resource endpoints.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use trackvault::auth::client::AuthHttpClient;
///
/// let client = AuthHttpClient::new(
///     Arc::new(reqwest::Client::new()),
///     "https://accounts.spotify.com".to_string(),
///     "https://api.spotify.com".to_string(),
///     "my-client-id".to_string(),
///     "http://localhost:3000/callback".to_string(),
/// );
/// assert_eq!(client.token_endpoint(), "https://accounts.spotify.com/api/token");
/// ```
pub struct AuthHttpClient {
    http: Arc<reqwest::Client>,
    accounts_base_url: String,
    api_base_url: String,
    client_id: String,
    redirect_uri: String,
}

impl AuthHttpClient {
    /// Creates a client for the given provider endpoints.
    ///
    /// Base URLs are stored without a trailing slash so endpoint paths can be
    /// appended directly.
    pub fn new(
        http: Arc<reqwest::Client>,
        accounts_base_url: String,
        api_base_url: String,
        client_id: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            http,
            accounts_base_url: accounts_base_url.trim_end_matches('/').to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            client_id,
            redirect_uri,
        }
    }

    /// The provider's token endpoint URL.
    pub fn token_endpoint(&self) -> String {
        format!("{}/api/token", self.accounts_base_url)
    }

    /// The provider's saved-tracks resource endpoint URL.
    pub fn tracks_endpoint(&self) -> String {
        format!("{}/v1/me/tracks", self.api_base_url)
    }

    /// Exchanges an authorization code for an access token.
    ///
    /// POSTs a form-urlencoded body carrying `grant_type=authorization_code`,
    /// the code, the redirect URI, the client ID, and the PKCE
    /// `code_verifier`.  The PKCE exchange never transmits a client secret.
    ///
    /// # Errors
    ///
    /// Returns [`TrackvaultError::TokenExchangeTransport`] on a non-success
    /// HTTP result and [`TrackvaultError::TokenFieldMissing`] when the
    /// response decodes but carries no `access_token` field.
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse> {
        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", &self.redirect_uri);
        params.insert("client_id", &self.client_id);
        params.insert("code_verifier", verifier);

        let resp = self
            .http
            .post(self.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                TrackvaultError::TokenExchangeTransport(format!("token request failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TrackvaultError::TokenExchangeTransport(format!(
                "token endpoint returned {status}: {body}"
            ))
            .into());
        }

        let raw: serde_json::Value = resp.json().await.map_err(|e| {
            TrackvaultError::TokenExchangeTransport(format!(
                "failed to parse token response: {e}"
            ))
        })?;

        let access_token = raw
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or(TrackvaultError::TokenFieldMissing)?
            .to_string();

        debug!("access token acquired");
        Ok(TokenResponse { access_token, raw })
    }

    /// Fetches one page of the user's saved tracks.
    ///
    /// Issues a bearer-authenticated GET with `limit` and `offset` query
    /// parameters.  `limit` is capped at the provider maximum of 50.
    ///
    /// # Errors
    ///
    /// Returns [`TrackvaultError::ResourceFetchTransport`] on a non-success
    /// HTTP result or an unparseable body.
    pub async fn fetch_saved_tracks(
        &self,
        access_token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SavedTracksPage> {
        let limit = limit.min(MAX_PAGE_LIMIT);

        let resp = self
            .http
            .get(self.tracks_endpoint())
            .query(&[("limit", limit), ("offset", offset)])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                TrackvaultError::ResourceFetchTransport(format!("tracks request failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TrackvaultError::ResourceFetchTransport(format!(
                "tracks endpoint returned {status}: {body}"
            ))
            .into());
        }

        let page: SavedTracksPage = resp.json().await.map_err(|e| {
            TrackvaultError::ResourceFetchTransport(format!(
                "failed to parse tracks response: {e}"
            ))
        })?;

        debug!(items = page.items.len(), "saved tracks page fetched");
        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
