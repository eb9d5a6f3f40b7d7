//! Command-line interface definition for Trackvault
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the browser-based login command.

use clap::{Parser, Subcommand};

/// Trackvault - desktop PKCE login for your saved tracks
///
/// Authenticates against the music provider through the system browser
/// using OAuth2 Authorization Code with PKCE, then fetches one page of
/// the user's saved tracks.
#[derive(Parser, Debug, Clone)]
#[command(name = "trackvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Trackvault
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Log in through the browser and fetch saved tracks
    Login {
        /// Page size for the saved-tracks fetch (provider maximum is 50)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Page offset for the saved-tracks fetch
        #[arg(short, long)]
        offset: Option<u32>,

        /// Do not open a browser; print the authorization URL instead
        #[arg(long)]
        no_browser: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
