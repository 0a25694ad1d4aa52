//! An EPP (RFC 5730/5734) session engine: a length-prefixed TLS transport,
//! a per-connection session state machine, a namespace-driven request
//! router, and an XML codec that synthesises namespaced EPP documents from
//! a namespace-agnostic document tree — plus a matching synchronous client.
//!
//! Start at [`listener::Listener`] for the server half and
//! [`client::Client`] (built via [`client::dial`]) for the client half. The
//! usual way to answer requests on the server side is a
//! [`session::Handler`] closure that decodes the inbound bytes, dispatches
//! through a [`router::Router`], and assembles the result into a
//! [`response::Response`] before re-encoding it — `demos/` has a worked
//! example.

pub mod client;
pub mod common;
pub mod error;
pub mod frame;
pub mod greeting;
pub mod listener;
pub mod login;
pub mod registry;
pub mod response;
pub mod result;
pub mod router;
pub mod session;
pub mod validator;
pub mod xml;

pub use error::Error;
