//! talkers-protocol: Wire protocol for the talkers message broker
//!
//! This crate defines the envelope type exchanged between clients and the
//! broker, together with the length-prefixed framing used to carry it over
//! a bidirectional stream.

pub mod codec;
pub mod envelope;
pub mod error;

pub use codec::{EnvelopeCodec, LEN_PREFIX_SIZE, MAX_FRAME_SIZE};
pub use envelope::{Envelope, MAX_CONTENT_CHARS};
pub use error::ProtocolError;
