//! Trackvault - browser-based PKCE login CLI
//!
#![doc = "Trackvault - browser-based PKCE login CLI"]
#![doc = "Main entry point for the Trackvault application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trackvault::cli::{Cli, Commands};
use trackvault::commands;
use trackvault::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Login {
            limit,
            offset,
            no_browser,
        } => {
            tracing::info!("Starting browser-based login");
            if let Some(l) = limit {
                tracing::debug!("Using page limit override: {}", l);
            }
            if let Some(o) = offset {
                tracing::debug!("Using page offset override: {}", o);
            }
            if no_browser {
                tracing::debug!("Browser launch disabled; authorization URL will be printed");
            }

            commands::login::run_login(config, limit, offset, no_browser).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "trackvault=debug"
    } else {
        "trackvault=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
