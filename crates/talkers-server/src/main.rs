//! talkers broker daemon
//!
//! Accepts QUIC connections from named clients and routes unicast messages
//! between them until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use talkers_core::config::{self, ServerConfig};
use talkers_server::BrokerServer;

#[derive(Parser)]
#[command(name = "talkers-server")]
#[command(about = "talkers message broker")]
#[command(version)]
struct Args {
    /// Listen address (ip:port)
    addr: String,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_dir().join("server.toml");
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                ServerConfig::default()
            })
        } else {
            ServerConfig::default()
        }
    };
    config.bind_address = args.addr;

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid listen address {:?}", config.bind_address))?;

    // Root cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Cancel on SIGINT or SIGTERM
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    let server = BrokerServer::bind(addr, config.idle_timeout, cancel.clone())?;
    server.run().await?;

    Ok(())
}
