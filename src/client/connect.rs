//! Pluggable transport dialing for [`super::Client`].
//!
//! [`Connector`] abstracts over how the byte stream to the server is
//! obtained, the way `djc-instant-epp`'s did; [`RustlsConnector`] is the
//! default implementation, using `rustls` + `tokio-rustls` the same way the
//! teacher crate's `dangerous` module already does (this crate standardises
//! on that module's modern `rustls_pki_types`-based API rather than the
//! older `OwnedTrustAnchor`-based one the teacher's own `connect.rs` used,
//! so the two don't disagree on which rustls version they target).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls_native_certs::CertificateResult;
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;
use tracing::info;

use crate::common::{Certificate, PrivateKey};
use crate::error::Error;
use crate::frame;

/// A way to obtain the byte stream a [`super::Client`] speaks EPP frames
/// over. Implement this to plug in a transport other than
/// [`RustlsConnector`] (e.g. a pre-established stream in tests).
#[async_trait]
pub trait Connector {
    type Connection: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, timeout: Duration) -> Result<Self::Connection, Error>;
}

/// Dials a TCP connection and performs a TLS handshake using `rustls`.
pub struct RustlsConnector {
    inner: TlsConnector,
    domain: ServerName<'static>,
    server: (String, u16),
}

impl RustlsConnector {
    /// Builds a connector trusting the platform's native certificate store,
    /// optionally presenting a client certificate for mutual TLS.
    pub async fn new(
        server: (String, u16),
        identity: Option<(Vec<Certificate>, PrivateKey)>,
    ) -> Result<Self, Error> {
        let config = Self::client_config(identity)?;
        Self::from_config(server, config)
    }

    /// Builds a connector from an already-constructed `ClientConfig`, e.g.
    /// one built via [`super::dangerous::generate_non_verifying_config`].
    pub fn from_config(server: (String, u16), config: ClientConfig) -> Result<Self, Error> {
        let domain = ServerName::try_from(server.0.clone())
            .map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("invalid domain: {}", server.0))))?;

        Ok(RustlsConnector {
            inner: TlsConnector::from(Arc::new(config)),
            domain,
            server,
        })
    }

    fn client_config(identity: Option<(Vec<Certificate>, PrivateKey)>) -> Result<ClientConfig, Error> {
        let mut roots = tokio_rustls::rustls::RootCertStore::empty();
        let CertificateResult { certs, mut errors, .. } = rustls_native_certs::load_native_certs();
        if let Some(err) = errors.pop() {
            return Err(Error::Other(Box::new(err)));
        }
        for cert in certs {
            roots
                .add(cert)
                .map_err(|err| Error::Other(Box::new(err)))?;
        }

        let builder = ClientConfig::builder().with_root_certificates(roots);

        match identity {
            Some((certs, key)) => {
                let certs = certs
                    .into_iter()
                    .map(|cert| rustls_pki_types::CertificateDer::from(cert.0))
                    .collect();
                let key = rustls_pki_types::PrivateKeyDer::try_from(key.0).map_err(|err| {
                    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, err))
                })?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(Error::Tls)
            }
            None => Ok(builder.with_no_client_auth()),
        }
    }
}

#[async_trait]
impl Connector for RustlsConnector {
    type Connection = tokio_rustls::client::TlsStream<TcpStream>;

    async fn connect(&self, timeout: Duration) -> Result<Self::Connection, Error> {
        info!(host = %self.server.0, port = self.server.1, "connecting");
        let addr = lookup_host((self.server.0.as_str(), self.server.1))
            .await?
            .next()
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("could not resolve host: {}", self.server.0),
                ))
            })?;

        let stream = TcpStream::connect(addr).await?;
        let connect = self.inner.connect(self.domain.clone(), stream);
        match frame::timeout(timeout, connect).await? {
            Ok(stream) => Ok(stream),
            Err(err) => Err(Error::Io(err)),
        }
    }
}
