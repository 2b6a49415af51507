//! TLS configuration helpers.
//!
//! Certificate and key material is loaded by the embedding application and
//! handed in as rustls config values; whether a socket acts as a TLS client
//! or server is fixed by the config type it is built with.

use std::io;
use std::sync::Arc;

use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::CryptoProvider;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{self, DigitallySignedStruct, SignatureScheme};

use crate::net::addr::ConnectTarget;
use crate::{Error, Result};

/// Builds a server config from PEM-encoded certificate chain and private key.
pub fn tls_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<rustls::ServerConfig>> {
    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<io::Result<Vec<_>>>()
        .map_err(Error::new_tls)?;
    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(Error::new_tls)?
        .ok_or_else(|| {
            Error::new_tls(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no private key found in PEM input",
            ))
        })?;
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(Error::new_tls)?;
    Ok(Arc::new(config))
}

/// Builds a client config that skips server certificate verification.
///
/// Only fit for talking to self-signed deployments, e.g. in tests.
pub fn insecure_tls_client_config() -> Arc<rustls::ClientConfig> {
    let provider = rustls::crypto::aws_lc_rs::default_provider();
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerification { provider }))
        .with_no_client_auth();
    Arc::new(config)
}

/// The SNI name presented when connecting to `target`.
pub(crate) fn server_name_for(target: &ConnectTarget) -> Result<ServerName<'static>> {
    match target {
        ConnectTarget::Host(host) => {
            ServerName::try_from(host.host().to_string()).map_err(Error::new_tls)
        }
        ConnectTarget::Endpoint(ep) => {
            Ok(ServerName::from(std::net::IpAddr::V4(ep.addr())))
        }
    }
}

#[derive(Debug)]
struct NoVerification {
    provider: CryptoProvider,
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
