//! The namespace-agnostic document tree and the codec that serialises it to,
//! and parses it from, EPP XML.

mod codec;
mod element;

pub use codec::{decode, encode, parse, FromElement, ToElement, XmlError, EPP_XML_HEADER};
pub use element::{Element, Node};
