//! talkers-client: Terminal client for the talkers message broker
//!
//! Dials the broker over QUIC, registers under a chosen ID, and exchanges
//! unicast messages with other named clients.

pub mod connector;
pub mod input;

pub use connector::{
    BrokerSession, ConnectError, Connector, SendError, SessionReader, SessionWriter,
};
