//! Shared helpers for broker integration tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use talkers_core::tls;
use talkers_protocol::{Envelope, EnvelopeCodec};
use talkers_server::{BrokerServer, Registry};

/// A broker running on an ephemeral loopback port
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    pub cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Trigger graceful shutdown and wait for the accept loop to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Start a broker on 127.0.0.1:0 with a short idle timeout
pub async fn start_server() -> TestServer {
    let cancel = CancellationToken::new();
    let server = BrokerServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        Duration::from_secs(30),
        cancel.clone(),
    )
    .expect("failed to bind test server");

    let addr = server.local_addr().expect("local addr");
    let registry = server.registry();

    let handle = tokio::spawn(async move {
        server.run().await.expect("server run failed");
    });

    TestServer {
        addr,
        registry,
        cancel,
        handle,
    }
}

/// A raw client endpoint speaking the envelope protocol
pub struct TestClient {
    pub endpoint: quinn::Endpoint,
    pub connection: quinn::Connection,
    pub writer: FramedWrite<quinn::SendStream, EnvelopeCodec>,
    pub reader: FramedRead<quinn::RecvStream, EnvelopeCodec>,
}

/// Connect and open the bidirectional stream, without registering
pub async fn connect(addr: SocketAddr) -> TestClient {
    let crypto = tls::insecure_client_crypto();
    let quic_crypto =
        quinn::crypto::rustls::QuicClientConfig::try_from(crypto).expect("client crypto");
    let mut client_config = quinn::ClientConfig::new(Arc::new(quic_crypto));

    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(
        quinn::IdleTimeout::try_from(Duration::from_secs(30)).unwrap(),
    ));
    client_config.transport_config(Arc::new(transport));

    let mut endpoint =
        quinn::Endpoint::client("127.0.0.1:0".parse().unwrap()).expect("client endpoint");
    endpoint.set_default_client_config(client_config);

    let connection = endpoint
        .connect(addr, tls::SERVER_NAME)
        .expect("connect")
        .await
        .expect("QUIC handshake failed");

    let (send, recv) = connection.open_bi().await.expect("open stream");

    TestClient {
        endpoint,
        connection,
        writer: FramedWrite::new(send, EnvelopeCodec::new()),
        reader: FramedRead::new(recv, EnvelopeCodec::new()),
    }
}

/// Connect and register under the given ID
pub async fn register(addr: SocketAddr, id: &str) -> TestClient {
    let mut client = connect(addr).await;
    client
        .send(Envelope::Register {
            from: id.to_string(),
        })
        .await;
    client
}

impl TestClient {
    pub async fn send(&mut self, envelope: Envelope) {
        self.writer.send(envelope).await.expect("send envelope");
    }

    pub async fn send_message(&mut self, to: &str, content: &str) {
        self.send(Envelope::Message {
            from_id: String::new(),
            to_id: to.to_string(),
            content: content.to_string(),
        })
        .await;
    }

    /// Read the next envelope, failing on timeout or stream end
    pub async fn expect_envelope(&mut self) -> Envelope {
        tokio::time::timeout(Duration::from_secs(5), self.reader.next())
            .await
            .expect("timed out waiting for envelope")
            .expect("stream ended unexpectedly")
            .expect("protocol error")
    }

    /// Assert the next envelope is an Error with exactly this text
    pub async fn expect_error(&mut self, expected: &str) {
        match self.expect_envelope().await {
            Envelope::Error { error } => assert_eq!(error, expected),
            other => panic!("expected Error envelope, got {:?}", other),
        }
    }

    /// Assert the next envelope is a Message with this sender and content
    pub async fn expect_message(&mut self, from: &str, content: &str) {
        match self.expect_envelope().await {
            Envelope::Message {
                from_id,
                content: got,
                ..
            } => {
                assert_eq!(from_id, from);
                assert_eq!(got, content);
            }
            other => panic!("expected Message envelope, got {:?}", other),
        }
    }

    /// Assert nothing arrives for a short while
    pub async fn expect_silence(&mut self) {
        let result =
            tokio::time::timeout(Duration::from_millis(300), self.reader.next()).await;
        if let Ok(received) = result {
            panic!("expected silence, got {:?}", received);
        }
    }

    /// Assert the stream terminates (end or transport error)
    pub async fn expect_closed(&mut self) {
        let next = tokio::time::timeout(Duration::from_secs(5), self.reader.next())
            .await
            .expect("timed out waiting for stream to close");
        match next {
            None | Some(Err(_)) => {}
            Some(Ok(envelope)) => panic!("expected closed stream, got {:?}", envelope),
        }
    }
}

/// Poll until the registry holds exactly `expected` clients
pub async fn wait_for_count(registry: &Registry, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if registry.count() == expected {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "registry count did not reach {} (currently {})",
                expected,
                registry.count()
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
