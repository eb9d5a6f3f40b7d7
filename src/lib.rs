//! Trackvault - browser-based PKCE login library
//!
//! This library implements the OAuth2 Authorization Code flow with PKCE for a
//! desktop application: PKCE material generation, a one-shot loopback listener
//! for the provider redirect, the browser launch, the token exchange, and a
//! bearer-authenticated fetch of the user's saved tracks.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: PKCE generation, loopback listener, HTTP clients, and the
//!   orchestrating authorization flow
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: CLI command handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio_util::sync::CancellationToken;
//! use trackvault::auth::flow::{AuthorizationFlow, SystemUrlLauncher};
//! use trackvault::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml")?;
//!     config.validate()?;
//!
//!     let mut flow = AuthorizationFlow::new(
//!         Arc::new(reqwest::Client::new()),
//!         config.auth_flow_config()?,
//!         Arc::new(SystemUrlLauncher),
//!     );
//!     let page = flow.run(&CancellationToken::new()).await?;
//!     println!("fetched {} saved tracks", page.items.len());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use auth::flow::AuthorizationFlow;
pub use auth::pkce::PkcePair;
pub use config::Config;
pub use error::{Result, TrackvaultError};
