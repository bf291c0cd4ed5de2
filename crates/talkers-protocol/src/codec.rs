//! Tokio codec for length-prefixed envelopes
//!
//! Each frame on the wire is a 4-byte big-endian length prefix followed by
//! that many bytes of bincode-encoded [`Envelope`]. The prefix and payload
//! are staged into a single buffer so a conformant reader never observes a
//! partial frame as a complete one.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::envelope::Envelope;
use crate::error::ProtocolError;

/// Size of the length prefix in bytes
pub const LEN_PREFIX_SIZE: usize = 4;

/// Maximum allowed size of a single frame payload.
///
/// 512 KB accommodates 250K characters of content (up to 750KB would be
/// possible in UTF-8, but such a body already fails the character limit)
/// plus encoding overhead, and bounds allocation from a corrupted prefix.
pub const MAX_FRAME_SIZE: usize = 512 * 1024;

/// Codec for encoding/decoding envelope frames
#[derive(Debug, Default)]
pub struct EnvelopeCodec {
    /// Payload length parsed from the prefix, kept while the payload is
    /// still incomplete
    pending_len: Option<usize>,
}

impl EnvelopeCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self { pending_len: None }
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Parse the length prefix if we don't have one yet
        let len = match self.pending_len.take() {
            Some(len) => len,
            None => {
                if src.len() < LEN_PREFIX_SIZE {
                    return Ok(None);
                }

                let len = src.get_u32() as usize;
                if len == 0 {
                    return Err(ProtocolError::ZeroLengthFrame);
                }
                if len > MAX_FRAME_SIZE {
                    return Err(ProtocolError::FrameTooLarge {
                        size: len,
                        max: MAX_FRAME_SIZE,
                    });
                }
                len
            }
        };

        // Wait for the full payload before touching it
        if src.len() < len {
            self.pending_len = Some(len);
            src.reserve(len - src.len());
            return Ok(None);
        }

        let payload = src.split_to(len);
        let envelope = bincode::deserialize(&payload)?;
        Ok(Some(envelope))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(envelope) => Ok(Some(envelope)),
            None => {
                // EOF mid-frame is unrecoverable: report what was missing
                if let Some(expected) = self.pending_len.take() {
                    return Err(ProtocolError::ShortRead {
                        expected,
                        actual: src.len(),
                    });
                }
                if !src.is_empty() {
                    return Err(ProtocolError::ShortRead {
                        expected: LEN_PREFIX_SIZE,
                        actual: src.len(),
                    });
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = ProtocolError;

    fn encode(&mut self, envelope: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = bincode::serialize(&envelope)?;

        if payload.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        dst.reserve(LEN_PREFIX_SIZE + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);

        Ok(())
    }
}
