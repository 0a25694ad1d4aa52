//! An intentionally insecure [`RustlsConnector`](super::connect::RustlsConnector)
//! configuration for use against test registries with self-signed or
//! otherwise unverifiable certificates.
//!
//! This module implements a `ServerCertVerifier` that accepts every
//! certificate presented to it, performing no chain validation and no
//! hostname check. It is a direct adaptation of the teacher crate's own
//! `dangerous` module, ported to this crate's error type.
//!
//! WARNING: USE WITH CARE. A client configured this way cannot distinguish
//! the real registry from an attacker in the middle.

use std::sync::Arc;

use rustls_native_certs::CertificateResult;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::client::danger::*;
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::Error;

/// Builds a `ClientConfig` that trusts any server certificate.
pub fn generate_non_verifying_config() -> Result<ClientConfig, Error> {
    let mut roots = RootCertStore::empty();
    let CertificateResult { certs, mut errors, .. } = rustls_native_certs::load_native_certs();
    if let Some(err) = errors.pop() {
        return Err(Error::Other(Box::new(err)));
    }
    for cert in certs {
        roots.add(cert).map_err(|err| Error::Other(Box::new(err)))?;
    }

    let mut config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config
        .dangerous()
        .set_certificate_verifier(Arc::new(NonVerifyingCertVerifier));
    Ok(config)
}

/// A `ServerCertVerifier` that unconditionally accepts every certificate and
/// signature it is asked to check.
#[derive(Debug)]
struct NonVerifyingCertVerifier;

impl ServerCertVerifier for NonVerifyingCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA1,
            SignatureScheme::ECDSA_SHA1_Legacy,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}
