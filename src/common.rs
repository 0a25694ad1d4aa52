//! Small shared types used across the codec, client and server halves.

/// The EPP core XML namespace, `urn:ietf:params:xml:ns:epp-1.0`.
pub const EPP_XMLNS: &str = "urn:ietf:params:xml:ns:epp-1.0";

/// The `xsi:schemaLocation` value the server attaches to its `<epp>` root.
pub const EPP_SCHEMA_LOCATION: &str = "urn:ietf:params:xml:ns:epp-1.0 epp-1.0.xsd";

/// A DER-encoded X.509 certificate, as configured for mutual TLS.
#[derive(Clone, Debug)]
pub struct Certificate(pub Vec<u8>);

/// A DER-encoded private key, as configured for mutual TLS.
#[derive(Clone, Debug)]
pub struct PrivateKey(pub Vec<u8>);
