//! Broker server configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Configuration for the broker daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the QUIC listener to
    pub bind_address: String,

    /// Connection idle timeout. The transport's idle timer is the only
    /// liveness mechanism; there is no application-level heartbeat.
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:4433".to_string(),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_idle_timeout() {
        let config = ServerConfig::default();
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ServerConfig = toml::from_str(r#"bind_address = "0.0.0.0:5000""#).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
    }
}
