//! The connection listener (spec §4.7).
//!
//! Grounded directly on the original Go server's `ListenAndServe`/
//! `processConnection`/`Stop`: a short accept deadline so the accept loop
//! can observe the stop signal, TCP keep-alive on every accepted socket, one
//! [`crate::session::Session`] per connection running on its own task, and a
//! wait-group the listener's `serve` joins on before returning. The Go
//! source's `proxyproto.NewConn` peek is generalised into an opt-in setting
//! rather than always-on, since PROXY protocol is only seen behind some load
//! balancers, not universally (see [`ServerConfig::accept_proxy_protocol`]).

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig as RustlsServerConfig};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::{Certificate, PrivateKey};
use crate::error::Error;
use crate::registry::NsRegistry;
use crate::session::{GreetingProducer, Handler, Session, SessionConfig};
use crate::validator::Validator;

/// How long [`Listener::serve`]'s accept loop blocks before re-checking the
/// stop signal (original Go source's `listenTimeout`).
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// TCP keep-alive period applied to every accepted socket.
const KEEPALIVE_PERIOD: Duration = Duration::from_secs(60);

/// Factory for a session's schema [`Validator`], invoked once per connection
/// since a validator is not assumed to be `Clone` or shareable.
pub type ValidatorFactory = Arc<dyn Fn() -> Box<dyn Validator> + Send + Sync>;

/// Everything [`Listener::bind`] needs to accept and run sessions.
pub struct ServerConfig {
    pub address: SocketAddr,
    pub tls_config: Arc<RustlsServerConfig>,
    pub greeting: GreetingProducer,
    pub handler: Handler,
    pub registry: Arc<NsRegistry>,
    pub session: SessionConfig,
    pub validator_factory: Option<ValidatorFactory>,
    /// Peek for and strip a PROXY protocol v1 text preamble before the TLS
    /// handshake. The decoded remote address is only used for logging — it
    /// is never treated as authoritative for authorization decisions.
    pub accept_proxy_protocol: bool,
    /// Called once from [`Listener::bind`] after the socket is bound, with
    /// the address actually bound to (useful when `address`'s port is `0`
    /// and the kernel picks one).
    pub on_started: Option<Arc<dyn Fn(SocketAddr) + Send + Sync>>,
}

/// Accepts connections on a bound socket and runs one [`Session`] per
/// connection until [`Listener::stop`] is called.
pub struct Listener {
    config: ServerConfig,
    tcp: TcpListener,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    sessions: Arc<Mutex<std::collections::HashMap<Uuid, watch::Sender<bool>>>>,
}

impl Listener {
    /// Binds `config.address`. Does not start accepting; call [`Self::serve`].
    pub async fn bind(config: ServerConfig) -> Result<Self, Error> {
        let tcp = TcpListener::bind(config.address).await?;
        let bound_addr = tcp.local_addr()?;
        info!(address = %bound_addr, "listening for connections");
        if let Some(on_started) = config.on_started.as_ref() {
            on_started(bound_addr);
        }
        let (stop_tx, stop_rx) = watch::channel(false);

        Ok(Listener {
            config,
            tcp,
            stop_tx,
            stop_rx,
            sessions: Arc::new(Mutex::new(std::collections::HashMap::new())),
        })
    }

    /// Runs the accept loop until [`Self::stop`] is called, then waits for
    /// every in-flight session to finish before returning.
    pub async fn serve(&self) -> Result<(), Error> {
        let acceptor = TlsAcceptor::from(self.config.tls_config.clone());
        let mut workers = JoinSet::new();

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            let accept = tokio::time::timeout(ACCEPT_POLL_INTERVAL, self.tcp.accept()).await;
            let (tcp_stream, peer_addr) = match accept {
                Err(_) => continue, // deadline elapsed, re-check stop signal
                Ok(Err(err)) => {
                    warn!(%err, "could not accept connection");
                    continue;
                }
                Ok(Ok(pair)) => pair,
            };

            if let Err(err) = tcp_stream.set_nodelay(true) {
                warn!(%err, "could not disable Nagle's algorithm");
            }
            if let Err(err) = set_keepalive(&tcp_stream) {
                warn!(%err, "could not set keepalive");
                continue;
            }

            let acceptor = acceptor.clone();
            let accept_proxy_protocol = self.config.accept_proxy_protocol;
            let id = Uuid::new_v4();
            let (session_stop_tx, session_stop_rx) = watch::channel(false);
            self.sessions
                .lock()
                .expect("session registry mutex poisoned")
                .insert(id, session_stop_tx);

            let registry = self.config.registry.clone();
            let greeting = self.config.greeting.clone();
            let handler = self.config.handler.clone();
            let session_config = self.config.session.clone();
            let validator = self.config.validator_factory.as_ref().map(|f| f());
            let sessions = self.sessions.clone();

            workers.spawn(async move {
                debug!(%id, %peer_addr, "accepted connection");

                let tcp_stream = match strip_proxy_preamble(tcp_stream, accept_proxy_protocol).await {
                    Ok(stream) => stream,
                    Err(err) => {
                        warn!(%id, %err, "could not read PROXY protocol preamble");
                        sessions.lock().expect("session registry mutex poisoned").remove(&id);
                        return;
                    }
                };

                let tls_stream = match acceptor.accept(tcp_stream).await {
                    Ok(stream) => stream,
                    Err(err) => {
                        warn!(%id, %err, "TLS handshake failed");
                        sessions.lock().expect("session registry mutex poisoned").remove(&id);
                        return;
                    }
                };

                let peer_certificates = tls_stream
                    .get_ref()
                    .1
                    .peer_certificates()
                    .map(|certs| certs.iter().map(|c| Certificate(c.to_vec())).collect())
                    .unwrap_or_default();

                let session = Session::new(
                    id,
                    tls_stream,
                    peer_certificates,
                    session_config,
                    registry,
                    greeting,
                    handler,
                    validator,
                    session_stop_rx,
                );

                let reason = session.run().await;
                debug!(%id, ?reason, "session ended");
                sessions.lock().expect("session registry mutex poisoned").remove(&id);
            });
        }

        while workers.join_next().await.is_some() {}
        info!("all sessions drained, listener stopped");
        Ok(())
    }

    /// Signals the accept loop to stop and every running session to close
    /// at its next cooperative check. Does not block; [`Self::serve`]
    /// returns once every session has actually exited.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let sessions = self.sessions.lock().expect("session registry mutex poisoned");
        for stop in sessions.values() {
            let _ = stop.send(true);
        }
    }
}

/// Builds a server `ClientConfig`-equivalent `ServerConfig` presenting
/// `cert_chain`/`key` and requiring every connecting client to present a
/// certificate chaining to one of `client_roots` (spec §6: "require any
/// client cert" is the only policy this crate ships; registries that want
/// an optional-client-cert or no-mTLS policy build their own `rustls`
/// `ServerConfig` and set [`ServerConfig::tls_config`] directly).
pub fn server_tls_config(
    cert_chain: Vec<Certificate>,
    key: PrivateKey,
    client_roots: Vec<Certificate>,
) -> Result<RustlsServerConfig, Error> {
    let certs: Vec<CertificateDer<'static>> = cert_chain.into_iter().map(|c| CertificateDer::from(c.0)).collect();
    let key = PrivateKeyDer::try_from(key.0)
        .map_err(|err| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, err)))?;

    let mut roots = RootCertStore::empty();
    for cert in client_roots {
        roots
            .add(CertificateDer::from(cert.0))
            .map_err(|err| Error::Other(Box::new(err)))?;
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|err| Error::Other(Box::new(err)))?;

    RustlsServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .map_err(Error::Tls)
}

fn set_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let sock = socket2::SockRef::from(stream);
    sock.set_keepalive(true)?;
    sock.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_time(KEEPALIVE_PERIOD))
}

/// Strips a PROXY protocol v1 text preamble (`PROXY TCP4/TCP6/UNKNOWN ...\r\n`)
/// if `enabled`, logging the address it carries. PROXY v2's binary framing is
/// not implemented (see DESIGN.md).
async fn strip_proxy_preamble(mut stream: TcpStream, enabled: bool) -> Result<TcpStream, Error> {
    if !enabled {
        return Ok(stream);
    }

    let mut probe = [0u8; 6];
    let n = stream.peek(&mut probe).await?;
    if &probe[..n] != b"PROXY " {
        return Ok(stream);
    }

    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).await?;
        line.push(byte[0]);
        if line.ends_with(b"\r\n") {
            break;
        }
        if line.len() > 107 {
            return Err(Error::Other("PROXY protocol v1 preamble too long".into()));
        }
    }

    let text = String::from_utf8_lossy(&line);
    info!(preamble = %text.trim_end(), "stripped PROXY protocol v1 preamble");
    Ok(stream)
}
