//! QUIC listener and shutdown supervision
//!
//! The broker server owns the endpoint, the shared registry, and the root
//! cancellation token. Each accepted connection runs in its own detached
//! task with a child token.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use talkers_core::tls;

use crate::handler::ConnectionHandler;
use crate::registry::Registry;

/// The broker server
pub struct BrokerServer {
    /// QUIC endpoint accepting client connections
    endpoint: quinn::Endpoint,
    /// Registry shared with every connection handler
    registry: Arc<Registry>,
    /// Root cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl BrokerServer {
    /// Bind the QUIC endpoint with a fresh self-signed identity.
    pub fn bind(
        addr: SocketAddr,
        idle_timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let crypto = tls::server_crypto().context("Failed to build server TLS identity")?;
        let quic_crypto = quinn::crypto::rustls::QuicServerConfig::try_from(crypto)
            .context("TLS configuration not usable for QUIC")?;
        let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(quic_crypto));

        let mut transport = quinn::TransportConfig::default();
        transport.max_idle_timeout(Some(
            quinn::IdleTimeout::try_from(idle_timeout).context("Idle timeout out of range")?,
        ));
        server_config.transport_config(Arc::new(transport));

        let endpoint = quinn::Endpoint::server(server_config, addr)
            .with_context(|| format!("Failed to bind QUIC listener on {}", addr))?;

        Ok(Self {
            endpoint,
            registry: Arc::new(Registry::new()),
            cancel,
        })
    }

    /// Address the endpoint is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint
            .local_addr()
            .context("Failed to read local address")
    }

    /// Shared registry handle
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until cancelled, then run the shutdown sequence.
    pub async fn run(&self) -> Result<()> {
        info!(addr = %self.local_addr()?, "server listening");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("accept loop shutting down");
                    break;
                }

                incoming = self.endpoint.accept() => {
                    let Some(incoming) = incoming else {
                        info!("endpoint closed, leaving accept loop");
                        break;
                    };

                    let registry = Arc::clone(&self.registry);
                    let cancel = self.cancel.child_token();
                    tokio::spawn(async move {
                        match incoming.await {
                            Ok(connection) => {
                                ConnectionHandler::new(registry, cancel)
                                    .run(connection)
                                    .await;
                            }
                            Err(err) => {
                                // A failed handshake affects one peer only
                                warn!(%err, "connection attempt failed");
                            }
                        }
                    });
                }
            }
        }

        // Unblock every handler's pending read, then drain the endpoint.
        // Handlers are detached; each removes itself on its own exit path.
        self.registry.close_all();
        self.endpoint.close(0u32.into(), b"server shutting down");
        self.endpoint.wait_idle().await;

        info!("server shutdown complete");
        Ok(())
    }
}
