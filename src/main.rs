//! Token service daemon

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use token_service::{ServiceConfig, TokenService};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "token-service")]
#[command(about = "Issues RTC, RTM and chat access tokens over HTTP")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides SERVER_PORT and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServiceConfig::from_env()
        .context("Service not configured; check .env file or APP_ID and APP_CERTIFICATE")?;
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    info!(
        port = config.listen_port(),
        origins = ?config.allowed_origins(),
        "Token service starting"
    );

    let service = Arc::new(TokenService::new(config));

    let watcher = service.clone();
    tokio::spawn(async move { watcher.stop().await });

    service.start().await.context("Token service failed")?;

    Ok(())
}
