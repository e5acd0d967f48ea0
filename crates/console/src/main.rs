//! Headless console shell: start a page lifetime, optionally log in, then
//! navigate to the target given on the command line and print the open tabs.

use anyhow::Context;

use opsdesk_console::{Console, ConsoleConfig, Credentials, PageRegistry};
use opsdesk_core::NodeId;

/// Comma-separated permission node ids whose pages are available.
const ENV_PAGES: &str = "OPSDESK_PAGES";
const ENV_TENANT: &str = "OPSDESK_TENANT";
const ENV_USER: &str = "OPSDESK_USER";
const ENV_PASSWORD: &str = "OPSDESK_PASSWORD";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    opsdesk_observability::init();

    let config = ConsoleConfig::from_env().context("invalid console configuration")?;

    let mut pages = PageRegistry::new(config.navigation.page_prefix.clone());
    if let Ok(ids) = std::env::var(ENV_PAGES) {
        for raw in ids.split(',') {
            match raw.parse::<NodeId>() {
                Ok(id) => {
                    let key = pages.register_node(&id, id.as_str());
                    tracing::debug!(key = %key, "page registered");
                }
                Err(err) => tracing::warn!(error = %err, "ignoring page id"),
            }
        }
    }

    let home = config.navigation.home_path.clone();
    let console = Console::connect(config, pages).await?;
    console.start().await;

    if let (Ok(user), Ok(password)) = (std::env::var(ENV_USER), std::env::var(ENV_PASSWORD)) {
        let tenant = std::env::var(ENV_TENANT).unwrap_or_default();
        match console.login(&Credentials::new(tenant, user, password)).await? {
            Some(location) => tracing::info!(path = %location.full_path, "logged in"),
            None => {
                let reason = console.session().last_error().await.unwrap_or_default();
                tracing::warn!(reason = %reason, "login failed");
            }
        }
    }

    let target = std::env::args().nth(1).unwrap_or(home);
    let location = console.navigate(&target).await?;
    tracing::info!(
        requested = %target,
        landed = %location.full_path,
        user = %console.session().username().await,
        "navigation finished"
    );

    let views = console.views().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&views).context("failed to render open tabs")?
    );
    Ok(())
}
