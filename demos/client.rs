//! A minimal EPP client: dial, read the greeting, log in, check a domain.
//!
//! ```text
//! cargo run --example client -- epp.example.com 700
//! ```
//!
//! Uses [`dangerous::generate_non_verifying_config`] since this demo talks
//! to a self-signed test registry; production code should build a
//! [`RustlsConnector::new`] with a real root store instead.

use std::env;
use std::time::Duration;

use epp_engine::client::dangerous::generate_non_verifying_config;
use epp_engine::client::{dial, RustlsConnector};
use epp_engine::registry::NsRegistry;
use epp_engine::xml::Element;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port: u16 = args
        .next()
        .map(|p| p.parse().expect("port must be a number"))
        .unwrap_or(700);

    let tls_config = generate_non_verifying_config()?;
    let connector = RustlsConnector::from_config((host, port), tls_config)?;
    let registry = NsRegistry::with_defaults();

    let mut client = dial(&connector, registry, "demo", Duration::from_secs(10)).await?;
    println!("connected to {}", client.greeting().server_id);

    client.login("demoClient", "demoPassword1").await?;
    println!("logged in");

    let check = Element::with_ns("check", "urn:ietf:params:xml:ns:domain-1.0").child(
        Element::with_ns("name", "urn:ietf:params:xml:ns:domain-1.0").text("example.net"),
    );
    let response = client.transact(CheckCommand(check)).await?;
    println!("check result: {}", response.result.code);

    Ok(())
}

/// Wraps a bare `<domain:check>` element so it can go through
/// [`epp_engine::client::Client::transact`], which needs a [`ToElement`]
/// document rather than a raw element.
struct CheckCommand(Element);

impl epp_engine::xml::ToElement for CheckCommand {
    fn to_element(&self) -> Element {
        Element::new("check").child(self.0.clone())
    }
}
