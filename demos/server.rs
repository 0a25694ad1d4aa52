//! A minimal EPP server wiring a [`Router`] into a [`Handler`] closure.
//!
//! This is the worked example `lib.rs`'s crate documentation points to: how
//! a deployment turns a router's per-operation `Element` output into a full
//! `<response>` envelope. Business logic beyond "does this domain exist in
//! an in-memory set" is deliberately out of scope — real registries plug in
//! their own provisioning backend where this demo plugs in a `HashSet`.
//!
//! Run with cert/key PEM files converted to DER (e.g. via `openssl x509
//! -outform der`/`openssl rsa -outform der`) and paths given as the first
//! two arguments:
//!
//! ```text
//! cargo run --example server -- server.der server.key.der
//! ```

use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use epp_engine::common::{Certificate, PrivateKey};
use epp_engine::greeting::{Dcp, DcpAccess, DcpRecipient, DcpRetention, DcpStatement, Greeting, ServiceMenu};
use epp_engine::listener::{server_tls_config, Listener, ServerConfig};
use epp_engine::login::Login;
use epp_engine::registry::NsRegistry;
use epp_engine::response::{EppResult, Response, ResponseTrId};
use epp_engine::result::ResultCode;
use epp_engine::router::Router;
use epp_engine::session::{SessionConfig, SessionContext};
use epp_engine::xml::{self, Element, FromElement, ToElement};

const ROOT_ATTRS: &[(&str, &str)] = &[
    ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    (
        "xsi:schemaLocation",
        epp_engine::common::EPP_SCHEMA_LOCATION,
    ),
];

/// A pretend domain book: "registered" names, shared across sessions.
#[derive(Default)]
struct Registrar {
    domains: Mutex<HashSet<String>>,
}

fn greeting() -> Greeting {
    Greeting {
        server_id: "demo.epp.example".to_string(),
        server_date: "2026-08-01T00:00:00Z".parse().unwrap(),
        service_menu: ServiceMenu {
            versions: vec!["1.0".to_string()],
            languages: vec!["en".to_string()],
            object_uris: vec!["urn:ietf:params:xml:ns:domain-1.0".to_string()],
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

fn build_router(registrar: Arc<Registrar>) -> Router {
    let mut router = Router::new();

    router.register("hello", |_op| Ok(greeting().to_element()));

    router.register("command/login", |op| {
        let login = Login::from_element(op)?;
        Ok(Element::new("loginResult").attr("clID", login.client_id))
    });

    router.register("command/logout", |_op| Ok(Element::new("logoutResult")));

    router.register("command/check/domain", move |op| {
        let name = op
            .find_any_ns("name")
            .and_then(Element::text_content)
            .ok_or("domain:check missing domain:name")?;
        let exists = registrar.domains.lock().unwrap().contains(&name);
        let chk_data = Element::with_ns("chkData", "urn:ietf:params:xml:ns:domain-1.0").child(
            Element::with_ns("cd", "urn:ietf:params:xml:ns:domain-1.0")
                .child(
                    Element::with_ns("name", "urn:ietf:params:xml:ns:domain-1.0")
                        .attr("avail", (!exists).to_string())
                        .text(name),
                ),
        );
        Ok(chk_data)
    });

    router
}

/// Turns a router's route-key-shaped `Element` result into a full response
/// envelope. `hello` is special: the router already returns a complete
/// `<greeting>` document, encoded directly with no `<response>` wrapper.
fn handle(ctx: &mut SessionContext<'_>, registry: &NsRegistry, router: &Router, body: &[u8]) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    let root = xml::parse(body)?;
    let key = epp_engine::router::route_key(&root, registry)?;

    if key == "hello" {
        let greeting_el = router.dispatch(&root, registry)?;
        return Ok(xml::encode(&ElementDoc(greeting_el), ROOT_ATTRS, registry)?.into_bytes());
    }

    let cl_trid = root
        .find(None, "command")
        .and_then(|c| c.find(None, "clTRID"))
        .and_then(Element::text_content);
    let sv_trid = format!("{}-{}", ctx.id.as_simple(), cl_trid.as_deref().unwrap_or("0"));

    let response = match router.dispatch(&root, registry) {
        Ok(res_data) => {
            if key == "command/login" {
                ctx.scratch.insert("authenticated", true);
            }
            let code = if key == "command/logout" {
                ResultCode::CompletedSuccessfullyEndingSession
            } else {
                ResultCode::CompletedSuccessfully
            };
            Response {
                result: EppResult::new(code),
                message_queue: None,
                res_data: res_data_or_none(res_data),
                extension: None,
                tr_ids: ResponseTrId {
                    client_tr_id: cl_trid,
                    server_tr_id: sv_trid,
                },
            }
        }
        Err(err) => Response {
            result: EppResult::with_reason(err.code, err.message),
            message_queue: None,
            res_data: None,
            extension: None,
            tr_ids: ResponseTrId {
                client_tr_id: cl_trid,
                server_tr_id: sv_trid,
            },
        },
    };

    Ok(xml::encode(&response, ROOT_ATTRS, registry)?.into_bytes())
}

/// `loginResult`/`logoutResult` carry no real payload; only surface a
/// `resData` block for commands with an actual one (the domain check).
fn res_data_or_none(el: Element) -> Option<Element> {
    if el.name == "loginResult" || el.name == "logoutResult" {
        None
    } else {
        Some(el)
    }
}

/// Adapts a bare [`Element`] — the router's `hello` output — to [`ToElement`]
/// so it can go through the same [`xml::encode`] every other document uses.
struct ElementDoc(Element);

impl ToElement for ElementDoc {
    fn to_element(&self) -> Element {
        self.0.clone()
    }
}

fn load_der(path: &str) -> std::io::Result<Vec<u8>> {
    std::fs::read(path)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let cert_path = args.next().expect("usage: server <cert.der> <key.der>");
    let key_path = args.next().expect("usage: server <cert.der> <key.der>");

    let cert_chain = vec![Certificate(load_der(&cert_path)?)];
    let key = PrivateKey(load_der(&key_path)?);
    // demo only: clients present any self-signed cert, none of them verified
    // against a real root store.
    let client_roots = cert_chain.clone();

    let tls_config = server_tls_config(cert_chain, key, client_roots)?;
    let registry = Arc::new(NsRegistry::with_defaults());
    let registrar = Arc::new(Registrar::default());
    let router = Arc::new(build_router(registrar));
    let registry_for_handler = registry.clone();

    let config = ServerConfig {
        address: "127.0.0.1:7000".parse::<SocketAddr>().unwrap(),
        tls_config: Arc::new(tls_config),
        greeting: Arc::new(|_ctx: &mut SessionContext<'_>| greeting()),
        handler: Arc::new(move |ctx, body| handle(ctx, &registry_for_handler, &router, body)),
        registry,
        session: SessionConfig::default(),
        validator_factory: None,
        accept_proxy_protocol: false,
        on_started: Some(Arc::new(|addr| println!("listening on {addr}"))),
    };

    let listener = Listener::bind(config).await?;
    listener.serve().await?;
    Ok(())
}
