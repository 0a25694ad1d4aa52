//! The namespace-agnostic document tree.
//!
//! Typed documents (greeting, login, response envelopes, ...) don't know how
//! to prefix themselves — they hand the codec an [`Element`] tree annotated
//! with the *full* namespace URI of each element, and [`super::codec`]
//! decides, once, which alias (if any) each URI gets on the wire. This is
//! the generalisation of the ad hoc `ValueElement` capture instant-epp used
//! only for its `<value>` escape hatch: here, every document is built the
//! same way.

/// One XML element: a qualified name, its attributes, and its children.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Element {
    /// Local element name, without any prefix.
    pub name: String,
    /// Full namespace URI. `None` means "inherit the ambient EPP core
    /// namespace" — used for the protocol-framing elements (`command`,
    /// `response`, `result`, `trID`, ...) that never need a prefix.
    pub ns: Option<String>,
    /// Attributes in the order they should be considered for output;
    /// rendering order itself is unspecified.
    pub attrs: Vec<(String, String)>,
    /// Child nodes, in document order.
    pub children: Vec<Node>,
}

/// A child of an [`Element`]: either a nested element, or text content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    /// Creates an element with no namespace (inherits the EPP core namespace).
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ns: None,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an element qualified with the given namespace URI.
    pub fn with_ns(name: impl Into<String>, ns: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ns: Some(ns.into()),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn maybe_child(self, child: Option<Element>) -> Self {
        match child {
            Some(child) => self.child(child),
            None => self,
        }
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children
            .extend(children.into_iter().map(Node::Element));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Concatenated text content of direct text children (ignores nested
    /// elements), analogous to `innerText` for simple leaf elements.
    pub fn text_content(&self) -> Option<String> {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    pub fn attr_value(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements, in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First direct child element matching `name` in namespace `ns` (`None`
    /// meaning the ambient EPP core namespace).
    pub fn find(&self, ns: Option<&str>, name: &str) -> Option<&Element> {
        self.child_elements()
            .find(|el| el.name == name && el.ns.as_deref() == ns)
    }

    /// First direct child element matching `name` regardless of namespace.
    pub fn find_any_ns(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.name == name)
    }
}
