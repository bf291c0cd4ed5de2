//! Client registry
//!
//! Thread-safe mapping from client ID to the live connection owned by that
//! session. A single reader-writer lock protects the whole map: lookups
//! take the shared lock, every mutation takes the exclusive lock, and no
//! await happens while either is held.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;

use talkers_core::ClientId;
use talkers_protocol::EnvelopeCodec;

/// Hard cap on concurrently registered clients
pub const MAX_CLIENTS: usize = 16;

/// Shared handle to a client's framed send half.
///
/// The mutex serialises writers so a forwarded frame is never interleaved
/// with an error reply on the same stream.
pub type ClientWriter = Arc<Mutex<FramedWrite<quinn::SendStream, EnvelopeCodec>>>;

/// Errors returned when admission to the registry fails
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The client ID is taken by a live session
    #[error("client ID is already registered")]
    DuplicateId,

    /// The registry already holds `MAX_CLIENTS` sessions
    #[error("maximum number of clients ({}) reached", MAX_CLIENTS)]
    CapacityReached,
}

/// A registered client's owned connection handles
#[derive(Clone)]
pub struct ClientRecord {
    /// The session's QUIC connection
    pub connection: quinn::Connection,
    /// Send half of the session's bidirectional stream
    pub writer: ClientWriter,
}

/// Map of registered clients, shared between all connection handlers
#[derive(Default)]
pub struct Registry {
    clients: RwLock<HashMap<ClientId, ClientRecord>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Add a client to the registry.
    ///
    /// Fails without modifying the registry when the ID is already present
    /// or the capacity of [`MAX_CLIENTS`] is reached.
    pub fn add(&self, id: ClientId, record: ClientRecord) -> Result<(), RegistryError> {
        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if clients.len() >= MAX_CLIENTS {
            return Err(RegistryError::CapacityReached);
        }
        if clients.contains_key(&id) {
            return Err(RegistryError::DuplicateId);
        }

        clients.insert(id, record);
        Ok(())
    }

    /// Remove a client from the registry. A no-op when the ID is absent.
    pub fn remove(&self, id: &ClientId) {
        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        clients.remove(id);
    }

    /// Look up a client's record by ID
    pub fn get(&self, id: &ClientId) -> Option<ClientRecord> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.get(id).cloned()
    }

    /// Number of registered clients
    pub fn count(&self) -> usize {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.len()
    }

    /// Close every registered client's stream and connection, then clear
    /// the map. Closes are best-effort: a writer held by an in-flight
    /// forward is skipped, and the connection close tears it down anyway.
    pub fn close_all(&self) {
        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for record in clients.values() {
            if let Ok(mut writer) = record.writer.try_lock() {
                let _ = writer.get_mut().finish();
            }
            record
                .connection
                .close(0u32.into(), b"server shutting down");
        }

        clients.clear();
    }
}
