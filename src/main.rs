use anyhow::{Context, Result};
use clap::Parser;
use jobpilot::cli::{handle_command, Cli};
use jobpilot::core::{ConfigManager, FsOps};
use std::fs::OpenOptions;
use tracing::info;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigManager::load()?;

    if let Some(dir) = config.config.log_file.parent() {
        FsOps::ensure_dir_exists(dir).await?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true) // Clear file on startup
        .open(&config.config.log_file)
        .with_context(|| format!("Failed to open log file {}", config.config.log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false),
        )
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Environment: {}", config.environment);
    info!("Database: {}", config.config.database_path.display());

    handle_command(cli, config).await
}
