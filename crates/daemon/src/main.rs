//! jobrelay - Main Entry Point

use anyhow::Result;
use jobrelay_core::provider::ProviderRegistry;
use jobrelay_daemon::{init_logging, Daemon, DaemonConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::from_env()?;
    init_logging(config.log_format)?;

    info!("jobrelay v{} starting...", jobrelay_core::VERSION);

    // Providers are contributed by the embedding host
    let registry = ProviderRegistry::new();
    let daemon = Daemon::new(config, registry).start().await?;

    info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    daemon.shutdown().await
}
