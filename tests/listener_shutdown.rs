//! Listener-level graceful shutdown: a real TCP+TLS connection through
//! `Listener::bind`/`serve`, then `Listener::stop()` draining it, the way
//! `session_lifecycle.rs`'s `stop_signal_ends_session_gracefully` exercises
//! the same contract one layer down (at `Session::run` directly).

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use epp_engine::client::{dial, RustlsConnector};
use epp_engine::common::{Certificate, PrivateKey};
use epp_engine::greeting::{Dcp, DcpAccess, DcpRecipient, DcpRetention, DcpStatement, Greeting, ServiceMenu};
use epp_engine::listener::{Listener, ServerConfig};
use epp_engine::registry::NsRegistry;
use epp_engine::session::{SessionConfig, SessionContext};
use rcgen::{generate_simple_self_signed, CertifiedKey};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use tokio_rustls::rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig as RustlsServerConfig, SignatureScheme};

fn test_greeting() -> Greeting {
    Greeting {
        server_id: "shutdown-test.epp.example".to_string(),
        server_date: "2026-08-01T00:00:00Z".parse().unwrap(),
        service_menu: ServiceMenu {
            versions: vec!["1.0".to_string()],
            languages: vec!["en".to_string()],
            object_uris: vec![],
            extension_uris: vec![],
        },
        dcp: Dcp {
            access: DcpAccess::None,
            statement: DcpStatement {
                purpose: vec![],
                recipient: DcpRecipient::default(),
                retention: DcpRetention::None,
            },
            expiry: None,
        },
    }
}

fn self_signed_server_config() -> RustlsServerConfig {
    let CertifiedKey { cert, signing_key } =
        generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
    let cert_der = Certificate(cert.der().to_vec());
    let key_der = PrivateKey(signing_key.serialize_der());

    let certs = vec![CertificateDer::from(cert_der.0)];
    let key = PrivateKeyDer::try_from(key_der.0).unwrap();
    RustlsServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap()
}

/// Accepts any server certificate without touching the platform certificate
/// store, so this test has no dependency on what roots (if any) the test
/// runner's environment happens to have installed.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
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
        vec![SignatureScheme::ECDSA_NISTP256_SHA256, SignatureScheme::ED25519]
    }
}

fn trust_anything_client_config() -> ClientConfig {
    let mut config = ClientConfig::builder()
        .with_root_certificates(RootCertStore::empty())
        .with_no_client_auth();
    config.dangerous().set_certificate_verifier(Arc::new(AcceptAnyServerCert));
    config
}

#[tokio::test]
async fn stop_drains_the_accept_loop_and_in_flight_sessions() {
    let tls_config = self_signed_server_config();
    let registry = Arc::new(NsRegistry::with_defaults());
    let bound_addr = Arc::new(Mutex::new(None::<SocketAddr>));
    let bound_addr_for_hook = bound_addr.clone();

    let config = ServerConfig {
        address: "127.0.0.1:0".parse().unwrap(),
        tls_config: Arc::new(tls_config),
        greeting: Arc::new(|_ctx: &mut SessionContext<'_>| test_greeting()),
        handler: Arc::new(|_ctx, _body| Ok(Vec::new())),
        registry,
        session: SessionConfig {
            read_poll_interval: Duration::from_millis(20),
            ..SessionConfig::default()
        },
        validator_factory: None,
        accept_proxy_protocol: false,
        on_started: Some(Arc::new(move |addr| {
            *bound_addr_for_hook.lock().unwrap() = Some(addr);
        })),
    };

    let listener = Arc::new(Listener::bind(config).await.unwrap());
    let addr = bound_addr.lock().unwrap().expect("on_started should have recorded the bound address");

    let listener_for_serve = listener.clone();
    let serve_task = tokio::spawn(async move { listener_for_serve.serve().await });

    let connector = RustlsConnector::from_config(("127.0.0.1".to_string(), addr.port()), trust_anything_client_config()).unwrap();
    let client = dial(&connector, NsRegistry::with_defaults(), "shutdown-test", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(client.greeting().server_id, "shutdown-test.epp.example");

    listener.stop();

    let result = tokio::time::timeout(Duration::from_secs(2), serve_task)
        .await
        .expect("serve() should return once sessions are drained")
        .unwrap();
    assert!(result.is_ok());
}
