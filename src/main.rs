//! Social API server.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ admission ──▶ authentication ──▶ [post context ──▶ authorization]
//!              (rate_limit)   (bearer JWT,         (owner or role level)
//!                              identity cache)
//!                                   │
//!                                   ▼
//!                               handlers ──▶ mutation coordinator ──▶ repositories
//!                                               (version CAS)
//! ```

use std::path::PathBuf;

use clap::Parser;

use social_api::config::{self, AppConfig};
use social_api::lifecycle;
use social_api::observability::init_logging;

#[derive(Parser)]
#[command(name = "social-api")]
#[command(about = "Social network API server", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "social-api starting");
    tracing::info!(
        env = %config.env,
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.enabled,
        cache = config.cache.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;
    Ok(())
}
