//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of a client ID, in characters
pub const MAX_CLIENT_ID_CHARS: usize = 32;

/// Error returned when a client ID fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("client ID must be 1-32 characters")]
pub struct InvalidClientId;

/// Self-declared identifier for a client session.
///
/// Immutable for the lifetime of a session and unique among currently
/// registered clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Validate and wrap a raw identifier
    pub fn parse(id: impl Into<String>) -> Result<Self, InvalidClientId> {
        let id = id.into();
        let chars = id.chars().count();
        if chars == 0 || chars > MAX_CLIENT_ID_CHARS {
            return Err(InvalidClientId);
        }
        Ok(Self(id))
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the ID, yielding the raw string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ClientId {
    type Err = InvalidClientId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_accepts_valid_lengths() {
        assert!(ClientId::parse("a").is_ok());
        assert!(ClientId::parse("alice").is_ok());
        assert!(ClientId::parse("a".repeat(32)).is_ok());
    }

    #[test]
    fn test_client_id_rejects_empty() {
        assert_eq!(ClientId::parse(""), Err(InvalidClientId));
    }

    #[test]
    fn test_client_id_rejects_too_long() {
        assert_eq!(ClientId::parse("a".repeat(33)), Err(InvalidClientId));
    }

    #[test]
    fn test_client_id_counts_characters_not_bytes() {
        // 32 three-byte characters: 96 bytes, but within the limit
        let id = "\u{3042}".repeat(32);
        assert!(id.len() > 32);
        assert!(ClientId::parse(id).is_ok());

        assert_eq!(
            ClientId::parse("\u{3042}".repeat(33)),
            Err(InvalidClientId)
        );
    }

    #[test]
    fn test_client_id_from_str() {
        let id: ClientId = "bob".parse().unwrap();
        assert_eq!(id.as_str(), "bob");
        assert_eq!(format!("{}", id), "bob");

        let err = "".parse::<ClientId>().unwrap_err();
        assert_eq!(err.to_string(), "client ID must be 1-32 characters");
    }
}
