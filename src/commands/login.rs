//! Browser-based login command
//!
//! Runs one complete authorization attempt and prints the fetched page of
//! saved tracks.  Ctrl-C cancels the flow through the cancellation token so
//! the loopback socket is released cleanly.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::flow::{AuthorizationFlow, NullUrlLauncher, SystemUrlLauncher, UrlLauncher};
use crate::config::Config;
use crate::error::Result;

/// Runs the login flow with optional paging overrides.
///
/// With `no_browser` set the authorization URL is only printed and the user
/// navigates manually; the listener waits either way.
pub async fn run_login(
    config: Config,
    limit: Option<u32>,
    offset: Option<u32>,
    no_browser: bool,
) -> Result<()> {
    let mut flow_config = config.auth_flow_config()?;
    if let Some(limit) = limit {
        flow_config.limit = limit;
    }
    if let Some(offset) = offset {
        flow_config.offset = offset;
    }

    let launcher: Arc<dyn UrlLauncher> = if no_browser {
        Arc::new(NullUrlLauncher)
    } else {
        Arc::new(SystemUrlLauncher)
    };

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling authorization flow");
            ctrl_c_cancel.cancel();
        }
    });

    let mut flow = AuthorizationFlow::new(
        Arc::new(reqwest::Client::new()),
        flow_config,
        launcher,
    );
    let page = flow.run(&cancel).await?;

    info!(
        items = page.items.len(),
        total = ?page.total,
        "saved tracks fetched"
    );
    for item in &page.items {
        let name = item.track.get("name").and_then(|v| v.as_str());
        match (name, item.added_at.as_deref()) {
            (Some(name), Some(added_at)) => println!("{added_at}  {name}"),
            (Some(name), None) => println!("{name}"),
            _ => println!("{}", item.track),
        }
    }

    Ok(())
}
