//! The namespace registry: maps full XML namespace URIs to short aliases.
//!
//! The codec uses it to decide which prefix (if any) to assign an element's
//! namespace the first time that namespace is seen along a root-to-leaf
//! path; the router uses it to turn an object command's namespace into the
//! `alias` segment of a route key. Seeded with EPP core plus the standard
//! object families and the extensions `djc-instant-epp` ships types for;
//! additional entries are registered at start-up and the table is read-only
//! from then on.

use std::collections::HashMap;

/// `urn:ietf:params:xml:ns:domain-1.0`.
pub const NS_DOMAIN: &str = "urn:ietf:params:xml:ns:domain-1.0";
/// `urn:ietf:params:xml:ns:host-1.0`.
pub const NS_HOST: &str = "urn:ietf:params:xml:ns:host-1.0";
/// `urn:ietf:params:xml:ns:contact-1.0`.
pub const NS_CONTACT: &str = "urn:ietf:params:xml:ns:contact-1.0";
/// `urn:ietf:params:xml:ns:secDNS-1.0`.
pub const NS_SECDNS_1_0: &str = "urn:ietf:params:xml:ns:secDNS-1.0";
/// `urn:ietf:params:xml:ns:secDNS-1.1`.
pub const NS_SECDNS_1_1: &str = "urn:ietf:params:xml:ns:secDNS-1.1";
/// `urn:ietf:params:xml:ns:rgp-1.0`.
pub const NS_RGP: &str = "urn:ietf:params:xml:ns:rgp-1.0";
/// `urn:ietf:params:xml:ns:changePoll-1.0`.
pub const NS_CHANGE_POLL: &str = "urn:ietf:params:xml:ns:changePoll-1.0";
/// `urn:se:iis:xml:epp:iis-1.2`.
pub const NS_IIS: &str = "urn:se:iis:xml:epp:iis-1.2";

/// A bidirectional URI-alias mapping. Aliases need not be unique — multiple
/// URIs may collapse onto the same alias for routing purposes — so lookups
/// from alias back to URI are not supported; only URI → alias is needed by
/// the codec and router.
#[derive(Clone, Debug, Default)]
pub struct NsRegistry {
    aliases: HashMap<String, String>,
}

impl NsRegistry {
    /// An empty registry: every namespace is unknown until registered.
    pub fn new() -> Self {
        NsRegistry {
            aliases: HashMap::new(),
        }
    }

    /// A registry seeded with EPP's standard object families and the
    /// extensions this crate carries types for.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(NS_DOMAIN, "domain");
        registry.register(NS_HOST, "host");
        registry.register(NS_CONTACT, "contact");
        registry.register(NS_SECDNS_1_0, "secDNS");
        registry.register(NS_SECDNS_1_1, "secDNS");
        registry.register(NS_RGP, "rgp");
        registry.register(NS_CHANGE_POLL, "changePoll");
        registry.register(NS_IIS, "iis");
        registry
    }

    /// Registers `uri` under `alias`, overwriting any prior alias for that
    /// URI. Intended for start-up configuration only.
    pub fn register(&mut self, uri: impl Into<String>, alias: impl Into<String>) {
        self.aliases.insert(uri.into(), alias.into());
    }

    /// Looks up the alias registered for `uri`, if any.
    pub fn alias_for(&self, uri: &str) -> Option<&str> {
        self.aliases.get(uri).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_core_object_families() {
        let registry = NsRegistry::with_defaults();
        assert_eq!(registry.alias_for(NS_DOMAIN), Some("domain"));
        assert_eq!(registry.alias_for(NS_HOST), Some("host"));
        assert_eq!(registry.alias_for(NS_CONTACT), Some("contact"));
        assert_eq!(registry.alias_for(NS_IIS), Some("iis"));
    }

    #[test]
    fn unregistered_uri_is_none() {
        let registry = NsRegistry::new();
        assert_eq!(registry.alias_for("urn:example:unknown-1.0"), None);
    }

    #[test]
    fn aliases_need_not_be_unique() {
        let registry = NsRegistry::with_defaults();
        assert_eq!(registry.alias_for(NS_SECDNS_1_0), registry.alias_for(NS_SECDNS_1_1));
    }

    #[test]
    fn later_registration_overwrites_earlier_alias() {
        let mut registry = NsRegistry::new();
        registry.register(NS_DOMAIN, "d1");
        registry.register(NS_DOMAIN, "d2");
        assert_eq!(registry.alias_for(NS_DOMAIN), Some("d2"));
    }
}
