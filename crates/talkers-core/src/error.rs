//! Core error types for talkers

use std::path::PathBuf;
use talkers_protocol::ProtocolError;
use thiserror::Error;

/// Top-level error type for the talkers ecosystem
#[derive(Error, Debug)]
pub enum TalkersError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// TLS identity errors
#[derive(Error, Debug)]
pub enum TlsError {
    /// Certificate generation failed
    #[error("Certificate generation failed: {0}")]
    CertificateGeneration(#[from] rcgen::Error),

    /// The generated identity was rejected by rustls
    #[error("Invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}
