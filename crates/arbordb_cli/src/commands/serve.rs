//! Serve command implementation.

use anyhow::Context;
use arbordb_server::ServerConfig;
use std::path::Path;
use tracing::info;

/// Runs the server with the config at `config`, or the default config.
pub async fn run(config: Option<&Path>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => ServerConfig::load(path)
            .await
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            info!("no config file given, using defaults");
            ServerConfig::default()
        }
    };
    if config.admin_keys.is_empty() && config.state_path.is_none() {
        tracing::warn!("no admin keys configured, the management API is unreachable");
    }
    arbordb_server::run_with_config_until_ctrl_c(config).await?;
    Ok(())
}
