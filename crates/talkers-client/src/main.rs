//! talkers terminal client
//!
//! Registers with the broker under a chosen ID, sends stdin lines of the
//! form `<to_id>:<content>` as messages, and prints everything addressed
//! to this client.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use talkers_client::connector::{Connector, SendError, SessionReader};
use talkers_client::input;
use talkers_core::config::{self, ClientConfig};
use talkers_core::ClientId;
use talkers_protocol::Envelope;

#[derive(Parser)]
#[command(name = "talkers-client")]
#[command(about = "talkers chat client")]
#[command(version)]
struct Args {
    /// Client ID to register under (1-32 characters)
    client_id: ClientId,

    /// Server address (ip:port)
    server: String,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
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
        let default_path = config::default_config_dir().join("client.toml");
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                ClientConfig::default()
            })
        } else {
            ClientConfig::default()
        }
    };
    config.server_address = args.server;

    let connector = Connector::new(args.client_id, config);
    let session = connector
        .connect()
        .await
        .context("Failed to connect to server")?;
    let (reader, mut writer) = session.into_split();

    // Incoming traffic is handled concurrently with stdin
    let mut read_task = tokio::spawn(read_loop(reader));

    // Forward stdin lines through a channel so the select loop stays simple
    let (input_tx, mut input_rx) = tokio::sync::mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if input_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nInterrupted, shutting down...");
                break;
            }

            outcome = &mut read_task => {
                match outcome {
                    Ok(Ok(())) => eprintln!("Server closed the connection"),
                    Ok(Err(err)) => eprintln!("Error: {:#}", err),
                    Err(err) => tracing::error!(%err, "read loop failed"),
                }
                break;
            }

            line = input_rx.recv() => {
                // Channel closes when stdin is exhausted
                let Some(line) = line else { break; };

                let Some((to, content)) = input::parse_line(&line) else {
                    eprintln!("Error: invalid input format, expected <to_id>:<content>");
                    continue;
                };

                match writer.send_message(to, content).await {
                    Ok(()) => {}
                    Err(err @ SendError::ContentTooLarge) => {
                        // Local rejection; the session is still usable
                        eprintln!("Error: {}", err);
                    }
                    Err(err) => {
                        eprintln!("Error: {}", err);
                        break;
                    }
                }
            }
        }
    }

    read_task.abort();
    writer.close().await;

    Ok(())
}

/// Print incoming envelopes until the stream ends. An `Error` envelope from
/// the broker is terminal: display it and stop.
async fn read_loop(mut reader: SessionReader) -> Result<()> {
    while let Some(next) = reader.next_envelope().await {
        match next {
            Ok(Envelope::Message {
                from_id, content, ..
            }) => {
                println!("[{}]: {}", from_id, content);
            }
            Ok(Envelope::Error { error }) => {
                anyhow::bail!("server error: {}", error);
            }
            Ok(other) => {
                tracing::warn!(kind = other.kind(), "unexpected envelope from server");
            }
            Err(err) => {
                return Err(err).context("Failed to read envelope");
            }
        }
    }
    Ok(())
}
