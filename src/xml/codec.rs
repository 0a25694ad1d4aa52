//! Parses EPP XML into an [`Element`] tree and serialises one back out,
//! injecting namespace prefixes from a [`NsRegistry`] along the way.
//!
//! Decoding uses `quick_xml`'s namespace-resolving pull parser (the same
//! low-level approach `netconf-rust` uses for a structurally similar
//! length-prefixed, namespaced protocol); encoding is a single recursive
//! walk that carries a small namespace stack, per the "streaming emit with a
//! namespace-stack state" design note — the decision of which alias (if any)
//! an element's namespace gets is made exactly once, at the point that
//! namespace is first seen along the current root-to-leaf path.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::common::EPP_XMLNS;
use crate::registry::NsRegistry;
use crate::xml::element::{Element, Node};

pub const EPP_XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#;

/// Errors raised while parsing or serialising an EPP document.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("xml parse error: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("invalid utf-8 in xml: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("malformed document: {0}")]
    Malformed(&'static str),

    #[error("missing required field: {0}")]
    Missing(String),

    #[error("unexpected value: {0}")]
    Unexpected(String),
}

/// Converts a typed document into the generic tree the codec can emit.
pub trait ToElement {
    fn to_element(&self) -> Element;
}

/// Recovers a typed document from the generic tree the codec parsed.
pub trait FromElement: Sized {
    fn from_element(el: &Element) -> Result<Self, XmlError>;
}

/// Serialises `doc` as a complete `<epp>` document.
///
/// `root_attrs` are additional attributes on the `<epp>` root beyond the
/// default namespace declaration, which is always emitted (e.g. the
/// server's `xmlns:xsi`/`xsi:schemaLocation` pair).
pub fn encode<T: ToElement>(
    doc: &T,
    root_attrs: &[(&str, &str)],
    registry: &NsRegistry,
) -> Result<String, XmlError> {
    let mut root = Element::with_ns("epp", EPP_XMLNS);
    for (k, v) in root_attrs {
        root = root.attr(*k, *v);
    }
    root = root.child(doc.to_element());

    let mut out = String::new();
    out.push_str(EPP_XML_HEADER);
    out.push_str("\r\n");
    write_element(&mut out, &root, registry, &NsScope::default(), 0);
    Ok(out)
}

/// Parses a full `<epp>` document and decodes its single child as `T`.
pub fn decode<T: FromElement>(xml: &[u8]) -> Result<T, XmlError> {
    let xml = std::str::from_utf8(xml)?;
    let tree = parse_tree(xml)?;

    if tree.name != "epp" || tree.ns.is_some() {
        return Err(XmlError::Malformed("root element is not <epp>"));
    }

    let child = tree
        .child_elements()
        .next()
        .ok_or(XmlError::Malformed("<epp> has no child element"))?;
    T::from_element(child)
}

/// Parses raw bytes into the generic tree without decoding a typed document.
/// Used by the router, which only inspects structure.
pub fn parse(xml: &[u8]) -> Result<Element, XmlError> {
    let xml = std::str::from_utf8(xml)?;
    parse_tree(xml)
}

fn parse_tree(xml: &str) -> Result<Element, XmlError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let decoder = reader.decoder();
        let (resolved, event) = reader.read_resolved_event()?;
        match event {
            Event::Start(start) => {
                let el = start_element(decoder, &resolved, &start)?;
                stack.push(el);
            }
            Event::Empty(start) => {
                let el = start_element(decoder, &resolved, &start)?;
                close_element(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or(XmlError::Malformed("unmatched closing tag"))?;
                close_element(&mut stack, &mut root, el)?;
            }
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                if let Some(top) = stack.last_mut() {
                    if !text.is_empty() {
                        top.children.push(Node::Text(text));
                    }
                }
            }
            Event::CData(cdata) => {
                let text = std::str::from_utf8(&cdata)?.to_owned();
                if let Some(top) = stack.last_mut() {
                    top.children.push(Node::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or(XmlError::Malformed("document has no root element"))
}

fn close_element(
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None => {
            if root.is_some() {
                return Err(XmlError::Malformed("document has more than one root element"));
            }
            *root = Some(el);
        }
    }
    Ok(())
}

fn start_element(
    decoder: quick_xml::Decoder,
    resolved: &ResolveResult,
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<Element, XmlError> {
    let name = std::str::from_utf8(start.local_name().as_ref())?.to_string();
    let ns = match resolved {
        ResolveResult::Bound(Namespace(uri)) => {
            let uri = std::str::from_utf8(uri)?.to_string();
            if uri == EPP_XMLNS {
                None
            } else {
                Some(uri)
            }
        }
        _ => None,
    };

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.decode_and_unescape_value(decoder)?.into_owned();
        attrs.push((key, value));
    }

    Ok(Element {
        name,
        ns,
        attrs,
        children: Vec::new(),
    })
}

/// The namespace bindings active at a point in the tree during encoding.
#[derive(Clone, Default)]
struct NsScope {
    default_ns: Option<String>,
    aliases: Vec<(String, String)>,
}

fn write_element(out: &mut String, el: &Element, registry: &NsRegistry, scope: &NsScope, depth: usize) {
    out.push_str(&"  ".repeat(depth));

    let mut child_scope = scope.clone();
    let mut new_decl: Option<(String, String)> = None;

    let qualified_name = match &el.ns {
        None => el.name.clone(),
        Some(uri) if scope.default_ns.as_deref() == Some(uri.as_str()) => el.name.clone(),
        Some(uri) => match scope.aliases.iter().find(|(_, bound)| bound == uri) {
            Some((alias, _)) => format!("{alias}:{}", el.name),
            None => match registry.alias_for(uri) {
                Some(alias) => {
                    new_decl = Some((format!("xmlns:{alias}"), uri.clone()));
                    child_scope.aliases.push((alias.to_string(), uri.clone()));
                    format!("{alias}:{}", el.name)
                }
                None => {
                    new_decl = Some(("xmlns".to_string(), uri.clone()));
                    child_scope.default_ns = Some(uri.clone());
                    el.name.clone()
                }
            },
        },
    };

    out.push('<');
    out.push_str(&qualified_name);
    if let Some((key, value)) = &new_decl {
        push_attr(out, key, value);
    }
    for (key, value) in &el.attrs {
        push_attr(out, key, value);
    }

    let has_child_elements = el.children.iter().any(|n| matches!(n, Node::Element(_)));

    if el.children.is_empty() {
        out.push_str(" />\n");
        return;
    }

    if !has_child_elements {
        out.push('>');
        for node in &el.children {
            if let Node::Text(text) = node {
                out.push_str(&quick_xml::escape::escape(text));
            }
        }
        out.push_str("</");
        out.push_str(&qualified_name);
        out.push_str(">\n");
        return;
    }

    out.push_str(">\n");
    for node in &el.children {
        match node {
            Node::Element(child) => write_element(out, child, registry, &child_scope, depth + 1),
            Node::Text(text) => out.push_str(&quick_xml::escape::escape(text)),
        }
    }
    out.push_str(&"  ".repeat(depth));
    out.push_str("</");
    out.push_str(&qualified_name);
    out.push_str(">\n");
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&quick_xml::escape::escape(value));
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NsRegistry;

    struct Ping;

    impl ToElement for Ping {
        fn to_element(&self) -> Element {
            Element::with_ns("check", "urn:ietf:params:xml:ns:domain-1.0")
                .child(
                    Element::with_ns("name", "urn:ietf:params:xml:ns:domain-1.0")
                        .text("example.net"),
                )
        }
    }

    #[test]
    fn root_declares_epp_namespace_as_default() {
        let registry = NsRegistry::with_defaults();
        let xml = encode(&Ping, &[], &registry).unwrap();
        assert!(xml.contains(r#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">"#));
    }

    #[test]
    fn registered_namespace_gets_prefixed_once() {
        let registry = NsRegistry::with_defaults();
        let xml = encode(&Ping, &[], &registry).unwrap();
        assert!(xml.contains(r#"<domain:check xmlns:domain="urn:ietf:params:xml:ns:domain-1.0">"#));
        // the child inherits the prefix without re-declaring the namespace
        assert!(xml.contains("<domain:name>example.net</domain:name>"));
        assert!(!xml.matches("xmlns:domain").count().gt(&1));
    }

    #[test]
    fn unregistered_namespace_falls_back_to_default_declaration() {
        let registry = NsRegistry::new();
        let xml = encode(&Ping, &[], &registry).unwrap();
        assert!(xml.contains(r#"<check xmlns="urn:ietf:params:xml:ns:domain-1.0">"#));
    }

    #[test]
    fn decode_accepts_default_namespace_declarations() {
        let xml = br#"<?xml version="1.0"?>
<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
  <hello/>
</epp>"#;
        let tree = parse(xml).unwrap();
        assert_eq!(tree.name, "epp");
        assert!(tree.ns.is_none());
        assert_eq!(tree.find(None, "hello").unwrap().name, "hello");
    }

    #[test]
    fn decode_accepts_prefixed_operation_children() {
        let xml = br#"<?xml version="1.0"?>
<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
  <command>
    <check>
      <domain:check xmlns:domain="urn:ietf:params:xml:ns:domain-1.0">
        <domain:name>example.net</domain:name>
      </domain:check>
    </check>
    <clTRID>abc-123</clTRID>
  </command>
</epp>"#;
        let tree = parse(xml).unwrap();
        let command = tree.find(None, "command").unwrap();
        let check = command.find(None, "check").unwrap();
        let domain_check = check.find_any_ns("check").unwrap();
        assert_eq!(
            domain_check.ns.as_deref(),
            Some("urn:ietf:params:xml:ns:domain-1.0")
        );
        let name = domain_check.find_any_ns("name").unwrap();
        assert_eq!(name.text_content().as_deref(), Some("example.net"));
    }
}
