//! TLS identity and crypto configuration
//!
//! The broker presents a self-signed certificate generated at startup and
//! held in memory only; nothing is persisted or rotated. Clients skip
//! certificate verification entirely. This is a development posture and
//! must not ship to production.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};

use crate::error::TlsError;

/// ALPN protocol identifier spoken by both endpoints
pub const ALPN_PROTOCOL: &[u8] = b"talkers";

/// Subject/SAN on the generated server certificate, and the SNI clients dial
pub const SERVER_NAME: &str = "sqirvy.xyz";

/// Generate the in-memory self-signed server identity.
pub fn generate_server_identity(
) -> Result<(CertificateDer<'static>, PrivatePkcs8KeyDer<'static>), TlsError> {
    let certified = rcgen::generate_simple_self_signed(vec![SERVER_NAME.to_string()])?;
    let cert = certified.cert.der().clone();
    let key = PrivatePkcs8KeyDer::from(certified.signing_key.serialize_der());
    Ok((cert, key))
}

/// Build the broker's rustls server config: fresh self-signed identity
/// plus the `talkers` ALPN identifier.
pub fn server_crypto() -> Result<rustls::ServerConfig, TlsError> {
    let (cert, key) = generate_server_identity()?;

    let mut crypto = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key.into())?;
    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    Ok(crypto)
}

/// Build the client's rustls config.
///
/// Server certificate verification is skipped: the broker's certificate is
/// self-signed and regenerated on every start, so there is nothing stable
/// to pin against.
pub fn insecure_client_crypto() -> rustls::ClientConfig {
    let mut crypto = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
        .with_no_client_auth();
    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    crypto
}

/// Certificate verifier that accepts any server certificate.
#[derive(Debug)]
struct SkipServerVerification;

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
