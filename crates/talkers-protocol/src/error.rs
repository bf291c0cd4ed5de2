//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or decoding envelopes
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame length prefix exceeds the maximum frame size
    #[error("frame size {size} exceeds maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    /// Frame length prefix is zero
    #[error("frame size cannot be zero")]
    ZeroLengthFrame,

    /// Stream ended in the middle of a frame
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Envelope payload could not be decoded
    #[error("failed to decode envelope: {0}")]
    Decode(#[from] bincode::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
