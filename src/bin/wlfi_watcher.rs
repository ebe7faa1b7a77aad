use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use wlfi_watcher::config::{AppConfig, CONFIG_PATH, Credentials};
use wlfi_watcher::orchestrator::Watcher;

#[derive(Parser)]
#[command(name = "wlfi_watcher", about = "Token launch and mention watcher with Telegram alerts")]
struct Args {
    /// Log notifications instead of sending them
    #[arg(long, conflicts_with = "live")]
    dry_run: bool,

    /// Send notifications through the Telegram Bot API
    #[arg(long, conflicts_with = "dry_run")]
    live: bool,

    /// Path to the TOML config file (defaults are used if it does not exist)
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Require exactly one mode
    if !args.dry_run && !args.live {
        anyhow::bail!("Must specify either --dry-run or --live");
    }

    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let config = AppConfig::load_or_default(&args.config)?;
    if args.config.exists() {
        info!("Loaded config from {}", args.config.display());
    } else {
        info!("No config at {}, using defaults", args.config.display());
    }
    let creds = Credentials::from_env();

    let mode = if args.dry_run { "dry-run" } else { "live" };
    info!(
        "Starting watcher ({mode}): keyword={} subscribers={} timeout={}s",
        config.settings.keyword,
        config.settings.subscribers_path,
        config.settings.request_timeout_secs,
    );

    let watcher = Watcher::new(config, creds, args.dry_run)?;
    let mut supervisor = watcher.start().await;

    info!("Watching. Press Ctrl+C to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = supervisor.wait() => {
            info!("All pollers stopped");
        }
    }
    supervisor.shutdown().await;

    Ok(())
}
