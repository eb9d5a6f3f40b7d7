//! Browser-based OAuth2 authorization with PKCE
//!
//! This module implements the full desktop authorization code flow: PKCE
//! material generation, a one-shot loopback listener for the provider
//! redirect, the browser launch side effect, the token exchange, and the
//! downstream saved-tracks fetch.
//!
//! # Module Layout
//!
//! - [`entropy`]     -- cryptographically secure random bytes
//! - [`pkce`]        -- PKCE `S256` verifier/challenge generation
//! - [`credentials`] -- persisted self-signed key/certificate pair
//! - [`listener`]    -- one-shot loopback redirect listener
//! - [`client`]      -- token exchange and saved-tracks HTTP clients
//! - [`flow`]        -- orchestrating state machine and `UrlLauncher` seam

pub mod client;
pub mod credentials;
pub mod entropy;
pub mod flow;
pub mod listener;
pub mod pkce;
