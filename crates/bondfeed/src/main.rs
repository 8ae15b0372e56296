//! bondfeed - real-time bond quote ingestion service
//!
//! # Usage
//!
//! ```bash
//! # Run with the default config path
//! bondfeed
//! bondfeed --config configs/bondfeed.toml
//! bondfeed --log-level debug
//! ```
//!
//! Configuration is fetched from the remote key-value source when one is
//! configured in the local file; any remote failure falls back to the local
//! file alone.

mod supervisor;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bondfeed_config::{Config, RemoteSource};

/// Real-time bond quote ingestion service
#[derive(Parser, Debug)]
#[command(name = "bondfeed")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/bondfeed.toml")]
    config: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = load_config(&cli).await?;
    supervisor::run(config).await
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}

/// Local file first (it names the remote source), then the remote document
/// when one is configured, falling back to the file on any remote failure.
async fn load_config(cli: &Cli) -> Result<Config> {
    let local = Config::from_file(&cli.config)?;

    if !local.remote.is_enabled() {
        tracing::info!(path = %cli.config.display(), "configuration loaded from file");
        return Ok(local);
    }

    let source = RemoteSource::new(local.remote.clone())?;
    match source.load().await {
        Ok(remote) => {
            tracing::info!(url = %local.remote.url, "configuration loaded from remote source");
            Ok(remote)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %cli.config.display(),
                "remote config fetch failed, using local file"
            );
            Ok(local)
        }
    }
}
