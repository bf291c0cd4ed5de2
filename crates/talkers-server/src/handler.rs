//! Per-connection handshake and routing
//!
//! One handler runs per accepted connection. It accepts the client's single
//! bidirectional stream, requires a `Register` envelope first, then routes
//! `Message` envelopes until the peer disconnects, violates the protocol,
//! or the supervisor cancels.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use talkers_core::ClientId;
use talkers_protocol::{Envelope, EnvelopeCodec, MAX_CONTENT_CHARS};

use crate::registry::{ClientRecord, ClientWriter, Registry};

/// Read half of a client's stream
type EnvelopeReader = FramedRead<quinn::RecvStream, EnvelopeCodec>;

/// Sent when the first envelope on a stream is not `Register`
const ERR_FIRST_MESSAGE: &str = "first message must be REGISTER";

/// Sent when a registered client sends anything other than `Message`
const ERR_UNEXPECTED_MESSAGE: &str = "unexpected message type after registration";

/// Errors reported to the sender when a message cannot be routed.
///
/// None of these closes the sender's connection; the sender may keep
/// sending after receiving the error reply.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// Message body exceeds the character limit
    #[error("content exceeds 250000 character limit")]
    ContentTooLarge,

    /// No live session under the destination ID
    #[error("destination client is not registered")]
    NotRegistered,

    /// The destination's stream died while forwarding; it has been evicted
    #[error("destination client is disconnected")]
    Disconnected,
}

/// Handler for a single client connection
pub struct ConnectionHandler {
    /// Shared client registry
    registry: Arc<Registry>,
    /// Handler-scoped cancellation, derived from the supervisor's token
    cancel: CancellationToken,
}

impl ConnectionHandler {
    /// Create a new handler
    pub fn new(registry: Arc<Registry>, cancel: CancellationToken) -> Self {
        Self { registry, cancel }
    }

    /// Drive the connection from stream accept to cleanup.
    ///
    /// Cleanup is idempotent: the handler removes itself by ID, and a
    /// shutdown that already cleared the registry makes that a no-op.
    pub async fn run(self, connection: quinn::Connection) {
        let remote = connection.remote_address();
        debug!(%remote, "connection accepted");

        // A client opens exactly one bidirectional stream
        let (send, recv) = tokio::select! {
            _ = self.cancel.cancelled() => return,
            accepted = connection.accept_bi() => match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    debug!(%remote, %err, "failed to accept stream");
                    return;
                }
            },
        };

        let mut reader = FramedRead::new(recv, EnvelopeCodec::new());
        let writer: ClientWriter = Arc::new(Mutex::new(FramedWrite::new(
            send,
            EnvelopeCodec::new(),
        )));

        let Some(client_id) = self
            .await_register(&connection, &mut reader, &writer)
            .await
        else {
            let _ = writer.lock().await.close().await;
            return;
        };

        info!(
            client = %client_id,
            %remote,
            count = self.registry.count(),
            "client registered"
        );

        loop {
            let envelope = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = reader.next() => match next {
                    Some(Ok(envelope)) => envelope,
                    Some(Err(err)) => {
                        debug!(client = %client_id, %err, "stream error");
                        break;
                    }
                    None => break,
                },
            };

            let (to_id, content) = match envelope {
                Envelope::Message { to_id, content, .. } => (to_id, content),
                other => {
                    debug!(
                        client = %client_id,
                        kind = other.kind(),
                        "unexpected envelope after registration"
                    );
                    send_error(&writer, ERR_UNEXPECTED_MESSAGE).await;
                    break;
                }
            };

            if let Err(err) = self.route_message(&client_id, to_id, content).await {
                send_error(&writer, &err.to_string()).await;
            }
        }

        self.registry.remove(&client_id);
        let _ = writer.lock().await.close().await;
        info!(client = %client_id, "client disconnected and removed");
    }

    /// Read and validate the registration handshake.
    ///
    /// Returns the registered ID, or `None` after sending a best-effort
    /// error reply for any deviation. Frame-level failures (oversize,
    /// zero-length, malformed) close without reply.
    async fn await_register(
        &self,
        connection: &quinn::Connection,
        reader: &mut EnvelopeReader,
        writer: &ClientWriter,
    ) -> Option<ClientId> {
        let envelope = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            next = reader.next() => match next {
                Some(Ok(envelope)) => envelope,
                Some(Err(err)) => {
                    debug!(%err, "failed to read first envelope");
                    return None;
                }
                None => return None,
            },
        };

        let from = match envelope {
            Envelope::Register { from } => from,
            other => {
                debug!(kind = other.kind(), "first envelope was not Register");
                send_error(writer, ERR_FIRST_MESSAGE).await;
                return None;
            }
        };

        let id = match ClientId::parse(from) {
            Ok(id) => id,
            Err(err) => {
                send_error(writer, &err.to_string()).await;
                return None;
            }
        };

        let record = ClientRecord {
            connection: connection.clone(),
            writer: Arc::clone(writer),
        };

        if let Err(err) = self.registry.add(id.clone(), record) {
            warn!(client = %id, %err, "registration refused");
            send_error(writer, &err.to_string()).await;
            return None;
        }

        Some(id)
    }

    /// Validate and forward one message.
    ///
    /// The incoming `from_id` is replaced with the sender's registered
    /// identity so a peer cannot impersonate another client.
    async fn route_message(
        &self,
        sender: &ClientId,
        to_id: String,
        content: String,
    ) -> Result<(), RouteError> {
        let chars = content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(RouteError::ContentTooLarge);
        }

        // An ID that fails validation can never be registered
        let dest_id = ClientId::parse(to_id).map_err(|_| RouteError::NotRegistered)?;

        let Some(dest) = self.registry.get(&dest_id) else {
            return Err(RouteError::NotRegistered);
        };

        let forwarded = Envelope::Message {
            from_id: sender.as_str().to_string(),
            to_id: dest_id.as_str().to_string(),
            content,
        };

        let mut dest_writer = dest.writer.lock().await;
        if let Err(err) = dest_writer.send(forwarded).await {
            drop(dest_writer);
            // A failed forward means the destination is gone: evict it so
            // later sends fail fast with NotRegistered
            debug!(dest = %dest_id, %err, "forward failed, evicting destination");
            self.registry.remove(&dest_id);
            return Err(RouteError::Disconnected);
        }

        info!(from = %sender, to = %dest_id, chars, "message routed");
        Ok(())
    }
}

/// Best-effort error reply. Failures are ignored: the peer is either about
/// to be closed or already unreachable.
async fn send_error(writer: &ClientWriter, error: &str) {
    let envelope = Envelope::Error {
        error: error.to_string(),
    };
    let _ = writer.lock().await.send(envelope).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_error_catalogue_strings() {
        assert_eq!(
            RouteError::ContentTooLarge.to_string(),
            "content exceeds 250000 character limit"
        );
        assert_eq!(
            RouteError::NotRegistered.to_string(),
            "destination client is not registered"
        );
        assert_eq!(
            RouteError::Disconnected.to_string(),
            "destination client is disconnected"
        );
    }

    #[test]
    fn test_handshake_violation_strings() {
        assert_eq!(ERR_FIRST_MESSAGE, "first message must be REGISTER");
        assert_eq!(
            ERR_UNEXPECTED_MESSAGE,
            "unexpected message type after registration"
        );
    }
}
