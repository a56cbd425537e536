//! Terminal Gateway - Main Entry Point
//!
//! Loads configuration, installs logging and serves the gateway and core
//! ports until SIGINT or SIGTERM.

use anyhow::Context;
use tracing::info;

use terminal_gateway::app;
use terminal_gateway::observability::init_logging;
use terminal_gateway::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_logging(&config.log).context("unable to install logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting terminal gateway"
    );
    app::run(config).await?;
    info!("Terminal gateway stopped");
    Ok(())
}
