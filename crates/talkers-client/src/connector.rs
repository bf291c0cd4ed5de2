//! Outbound QUIC connector
//!
//! Dials the broker, opens the single bidirectional stream, and performs
//! the `Register` handshake. The resulting session splits into independent
//! read and write halves so receiving can run concurrently with input.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_util::codec::{FramedRead, FramedWrite};

use talkers_core::config::ClientConfig;
use talkers_core::tls;
use talkers_core::ClientId;
use talkers_protocol::{Envelope, EnvelopeCodec, ProtocolError, MAX_CONTENT_CHARS};

/// Connection establishment errors
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The configured server address did not parse
    #[error("invalid server address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    /// The local UDP endpoint could not be created
    #[error("failed to create endpoint: {0}")]
    Endpoint(#[from] std::io::Error),

    /// The client crypto was rejected by the QUIC stack
    #[error("TLS configuration not usable for QUIC: {0}")]
    Crypto(#[from] quinn::crypto::rustls::NoInitialCipherSuite),

    /// The configured idle timeout exceeds what the transport can encode
    #[error("invalid transport configuration: {0}")]
    Transport(#[from] quinn::VarIntBoundsExceeded),

    /// The dial was rejected before the handshake
    #[error("connection rejected: {0}")]
    Connect(#[from] quinn::ConnectError),

    /// The connection failed during or after the handshake
    #[error("connection failed: {0}")]
    Connection(#[from] quinn::ConnectionError),

    /// The registration envelope could not be written
    #[error("failed to send registration: {0}")]
    Register(#[from] ProtocolError),

    /// The handshake did not complete within the connect timeout
    #[error("connection timed out")]
    Timeout,
}

/// Errors while sending on an established session
#[derive(Debug, Error)]
pub enum SendError {
    /// Message body exceeds the character limit
    #[error("message content exceeds {} characters", MAX_CONTENT_CHARS)]
    ContentTooLarge,

    /// The stream write failed
    #[error("failed to send message: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Establishes registered sessions with the broker
pub struct Connector {
    config: ClientConfig,
    client_id: ClientId,
}

impl Connector {
    /// Create a connector for the given identity
    pub fn new(client_id: ClientId, config: ClientConfig) -> Self {
        Self { config, client_id }
    }

    /// Dial the broker, open the stream, and register.
    pub async fn connect(&self) -> Result<BrokerSession, ConnectError> {
        let addr: SocketAddr =
            self.config
                .server_address
                .parse()
                .map_err(|source| ConnectError::InvalidAddress {
                    address: self.config.server_address.clone(),
                    source,
                })?;

        let crypto = tls::insecure_client_crypto();
        let quic_crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)?;
        let mut client_config = quinn::ClientConfig::new(Arc::new(quic_crypto));

        let mut transport = quinn::TransportConfig::default();
        transport.max_idle_timeout(Some(self.config.idle_timeout.try_into()?));
        client_config.transport_config(Arc::new(transport));

        let mut endpoint = quinn::Endpoint::client(SocketAddr::from(([0, 0, 0, 0], 0)))?;
        endpoint.set_default_client_config(client_config);

        tracing::debug!(server = %addr, "dialing broker");
        let connecting = endpoint.connect(addr, tls::SERVER_NAME)?;
        let connection = tokio::time::timeout(self.config.connect_timeout, connecting)
            .await
            .map_err(|_| ConnectError::Timeout)??;

        let (send, recv) = connection.open_bi().await?;
        let mut writer = FramedWrite::new(send, EnvelopeCodec::new());

        // The broker expects Register as the first envelope. Writing it
        // also makes the stream visible to the broker's stream accept.
        writer
            .send(Envelope::Register {
                from: self.client_id.as_str().to_string(),
            })
            .await?;

        tracing::info!(client = %self.client_id, server = %addr, "registered with broker");

        Ok(BrokerSession {
            endpoint,
            connection,
            client_id: self.client_id.clone(),
            writer,
            reader: FramedRead::new(recv, EnvelopeCodec::new()),
        })
    }
}

/// An established, registered session with the broker
pub struct BrokerSession {
    endpoint: quinn::Endpoint,
    connection: quinn::Connection,
    client_id: ClientId,
    writer: FramedWrite<quinn::SendStream, EnvelopeCodec>,
    reader: FramedRead<quinn::RecvStream, EnvelopeCodec>,
}

impl BrokerSession {
    /// Split into independent read and write halves
    pub fn into_split(self) -> (SessionReader, SessionWriter) {
        (
            SessionReader {
                reader: self.reader,
            },
            SessionWriter {
                endpoint: self.endpoint,
                connection: self.connection,
                client_id: self.client_id,
                writer: self.writer,
            },
        )
    }
}

/// Read half of a broker session
pub struct SessionReader {
    reader: FramedRead<quinn::RecvStream, EnvelopeCodec>,
}

impl SessionReader {
    /// Next envelope from the broker. `None` when the stream ends.
    pub async fn next_envelope(&mut self) -> Option<Result<Envelope, ProtocolError>> {
        self.reader.next().await
    }
}

/// Write half of a broker session. Also owns the connection for shutdown.
pub struct SessionWriter {
    endpoint: quinn::Endpoint,
    connection: quinn::Connection,
    client_id: ClientId,
    writer: FramedWrite<quinn::SendStream, EnvelopeCodec>,
}

impl SessionWriter {
    /// The identity this session registered under
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Send one message, validating content length locally first
    pub async fn send_message(&mut self, to: &str, content: &str) -> Result<(), SendError> {
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(SendError::ContentTooLarge);
        }

        self.writer
            .send(Envelope::Message {
                from_id: self.client_id.as_str().to_string(),
                to_id: to.to_string(),
                content: content.to_string(),
            })
            .await?;

        Ok(())
    }

    /// Close the stream and connection and drain the endpoint
    pub async fn close(mut self) {
        let _ = self.writer.close().await;
        self.connection
            .close(0u32.into(), b"client shutting down");
        self.endpoint.wait_idle().await;
    }
}
