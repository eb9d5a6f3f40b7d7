//! Configuration management for Trackvault
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from a YAML file, environment variables, and CLI overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::client::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::auth::credentials::CredentialStore;
use crate::auth::flow::AuthFlowConfig;
use crate::error::{Result, TrackvaultError};

/// Main configuration structure for Trackvault
///
/// Holds everything the authorization flow needs: the OAuth client settings,
/// the downstream resource paging, and the self-signed credential material
/// locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OAuth client and provider endpoint settings
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Saved-tracks resource settings
    #[serde(default)]
    pub tracks: TracksConfig,

    /// Self-signed credential material settings
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// OAuth client and provider endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth client identifier registered with the provider
    #[serde(default)]
    pub client_id: String,

    /// Reserved: never transmitted by the PKCE token exchange
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Loopback redirect URI registered with the provider
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Space-separated scopes to request
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Base URL for the provider's accounts host (authorization and token
    /// endpoints).  Overridable so tests can point at a local mock server.
    #[serde(default = "default_accounts_base_url")]
    pub accounts_base_url: String,

    /// Base URL for the provider's API host (resource endpoint)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_redirect_uri() -> String {
    "http://localhost:3000/callback".to_string()
}

fn default_scope() -> String {
    "user-library-read".to_string()
}

fn default_accounts_base_url() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_api_base_url() -> String {
    "https://api.spotify.com".to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            scope: default_scope(),
            accounts_base_url: default_accounts_base_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

/// Saved-tracks paging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracksConfig {
    /// Page size; the provider maximum is 50 per request
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Page offset
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Self-signed credential material configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Identity the self-signed certificate is bound to
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Override for the private key path; defaults to the app data directory
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Override for the certificate path; defaults to the app data directory
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
}

fn default_issuer() -> String {
    "Trackvault".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            key_path: None,
            cert_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oauth: OAuthConfig::default(),
            tracks: TracksConfig::default(),
            credentials: CredentialsConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file, applying environment overrides.
    ///
    /// A missing file is not an error: defaults are used with a warning, so a
    /// fully env-configured invocation works without a config file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&contents)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `TRACKVAULT_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(client_id) = std::env::var("TRACKVAULT_CLIENT_ID") {
            self.oauth.client_id = client_id;
        }
        if let Ok(client_secret) = std::env::var("TRACKVAULT_CLIENT_SECRET") {
            self.oauth.client_secret = Some(client_secret);
        }
        if let Ok(redirect_uri) = std::env::var("TRACKVAULT_REDIRECT_URI") {
            self.oauth.redirect_uri = redirect_uri;
        }
        if let Ok(scope) = std::env::var("TRACKVAULT_SCOPE") {
            self.oauth.scope = scope;
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TrackvaultError::Config`] when the client ID is empty, the
    /// redirect URI is not a loopback address, or the page limit exceeds the
    /// provider maximum.
    pub fn validate(&self) -> Result<()> {
        if self.oauth.client_id.is_empty() {
            return Err(TrackvaultError::Config(
                "client_id must be set (config file or TRACKVAULT_CLIENT_ID)".to_string(),
            )
            .into());
        }

        let redirect = Url::parse(&self.oauth.redirect_uri)
            .map_err(|e| TrackvaultError::Config(format!("invalid redirect_uri: {e}")))?;
        match redirect.host_str() {
            Some("localhost") | Some("127.0.0.1") | Some("[::1]") => {}
            other => {
                return Err(TrackvaultError::Config(format!(
                    "redirect_uri host must be a loopback address, got {:?}",
                    other
                ))
                .into());
            }
        }

        if self.tracks.limit == 0 || self.tracks.limit > MAX_PAGE_LIMIT {
            return Err(TrackvaultError::Config(format!(
                "tracks.limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, self.tracks.limit
            ))
            .into());
        }

        if self.oauth.scope.is_empty() {
            return Err(TrackvaultError::Config("scope must not be empty".to_string()).into());
        }

        Ok(())
    }

    /// Builds the per-attempt flow configuration from this config.
    ///
    /// Key and certificate paths fall back to the OS application-data
    /// directory when not overridden.
    pub fn auth_flow_config(&self) -> Result<AuthFlowConfig> {
        let redirect_uri = Url::parse(&self.oauth.redirect_uri)
            .map_err(|e| TrackvaultError::Config(format!("invalid redirect_uri: {e}")))?;

        let (default_key, default_cert) = CredentialStore::default_paths()?;
        let key_path = self.credentials.key_path.clone().unwrap_or(default_key);
        let cert_path = self.credentials.cert_path.clone().unwrap_or(default_cert);

        Ok(AuthFlowConfig {
            client_id: self.oauth.client_id.clone(),
            client_secret: self.oauth.client_secret.clone(),
            redirect_uri,
            scope: self.oauth.scope.clone(),
            accounts_base_url: self.oauth.accounts_base_url.clone(),
            api_base_url: self.oauth.api_base_url.clone(),
            limit: self.tracks.limit,
            offset: self.tracks.offset,
            issuer: self.credentials.issuer.clone(),
            key_path,
            cert_path,
        })
    }
}
