//! Error types for Trackvault
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Trackvault operations
///
/// This enum encompasses all failure conditions of the authorization flow:
/// entropy and PKCE material generation, credential persistence, the loopback
/// redirect listener, token exchange, and the downstream resource fetch.
///
/// Every fatal condition is reported to tracing and terminates the current
/// flow instance; none trigger an automatic retry.
#[derive(Error, Debug)]
pub enum TrackvaultError {
    /// The OS secure random source could not be read
    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(String),

    /// PKCE material generation failed (e.g. verifier length out of range)
    #[error("PKCE error: {0}")]
    Pkce(String),

    /// Key/certificate could not be generated or saved.
    ///
    /// Non-fatal to the current flow: the in-memory material is still used
    /// and the next run regenerates.
    #[error("Credential persistence error: {0}")]
    CredentialPersistence(String),

    /// The provider redirected back with an `error` query parameter
    #[error("Provider denied authorization: {0}")]
    ProviderDeniedAuthorization(String),

    /// HTTP-level failure during the authorization code exchange
    #[error("Token exchange failed: {0}")]
    TokenExchangeTransport(String),

    /// The token endpoint answered successfully but the decoded JSON carried
    /// no `access_token` field. Kept distinct from
    /// [`TrackvaultError::TokenExchangeTransport`] for diagnosability.
    #[error("Token response did not contain an access_token field")]
    TokenFieldMissing,

    /// HTTP-level failure fetching the saved-tracks resource
    #[error("Resource fetch failed: {0}")]
    ResourceFetchTransport(String),

    /// The system browser could not be opened with the authorization URL.
    ///
    /// Reported but not fatal: the flow keeps waiting on the listener so the
    /// user can navigate to the printed URL manually.
    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailure(String),

    /// Loopback redirect listener errors (bind, accept, malformed request)
    #[error("Loopback listener error: {0}")]
    Listener(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The flow was cancelled through the cancellation token
    #[error("Authorization flow cancelled")]
    Cancelled,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Trackvault operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
