//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Configuration for the terminal client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker address to connect to
    pub server_address: String,

    /// Connection idle timeout, mirroring the server's policy
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,

    /// How long to wait for the QUIC handshake before giving up
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:4433".to_string(),
            idle_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_address, "127.0.0.1:4433");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }
}
