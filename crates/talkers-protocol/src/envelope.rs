//! Envelope types for the talkers protocol

use serde::{Deserialize, Serialize};

/// Maximum length of a message body, counted in characters.
pub const MAX_CONTENT_CHARS: usize = 250_000;

/// The single wire message type. Exactly one variant is populated per frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    /// Session handshake declaring the sender's identity. Only valid as the
    /// first envelope on a stream.
    Register {
        /// Self-declared client ID
        from: String,
    },

    /// Failure report from the broker. Never forwarded between clients.
    Error {
        /// Human-readable error text
        error: String,
    },

    /// A unicast chat message.
    Message {
        /// Sender ID; the broker overwrites this with the session identity
        /// before forwarding
        from_id: String,
        /// Destination client ID
        to_id: String,
        /// Message body
        content: String,
    },
}

impl Envelope {
    /// Short name of the populated variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Register { .. } => "Register",
            Envelope::Error { .. } => "Error",
            Envelope::Message { .. } => "Message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_kind() {
        let register = Envelope::Register {
            from: "alice".to_string(),
        };
        assert_eq!(register.kind(), "Register");

        let error = Envelope::Error {
            error: "something failed".to_string(),
        };
        assert_eq!(error.kind(), "Error");

        let message = Envelope::Message {
            from_id: "alice".to_string(),
            to_id: "bob".to_string(),
            content: "hi".to_string(),
        };
        assert_eq!(message.kind(), "Message");
    }

    #[test]
    fn test_envelope_serde_roundtrip() {
        let envelope = Envelope::Message {
            from_id: "alice".to_string(),
            to_id: "bob".to_string(),
            content: "Hello Bob!".to_string(),
        };

        let bytes = bincode::serialize(&envelope).unwrap();
        let decoded: Envelope = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }
}
