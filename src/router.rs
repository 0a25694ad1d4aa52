//! Namespace-driven request dispatch (RFC 5730 §2.4 command taxonomy).
//!
//! A [`Router`] maps a route key derived purely from a `<command>`
//! document's shape — never from pre-registered schemas — to a handler.
//! The derivation itself is [`route_key`], modelled directly on the
//! `buildPath` walk in the original Go server's `Mux`: ensure the document
//! is rooted at `<epp>`, look at the single child of `<epp>`, and for
//! object commands take the alias of the namespace declared on that
//! command's own single child element.

use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::NsRegistry;
use crate::result::ResultCode;
use crate::xml::Element;

/// Operations that address a session rather than an object.
const SESSION_OPS: &[&str] = &["login", "logout", "poll"];

/// Operations that address an object and need a namespace alias appended.
const OBJECT_OPS: &[&str] = &[
    "check", "create", "delete", "info", "renew", "transfer", "update",
];

/// A handler invoked with the full request document and the element naming
/// the operation (e.g. the `<domain:check>` element, not just `<check>`).
///
/// Handlers are opaque collaborators: the router does not interpret their
/// output beyond requiring an [`Element`] to splice into the response body.
pub type HandlerFn = Arc<dyn Fn(&Element) -> Result<Element, Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// Dispatches decoded `<epp>` documents to registered handlers by route key.
#[derive(Clone, Default)]
pub struct Router {
    handlers: HashMap<String, HandlerFn>,
}

impl Router {
    pub fn new() -> Self {
        Router {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` under `key` (see [`route_key`] for the key
    /// grammar), replacing any handler already registered there.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        handler: impl Fn(&Element) -> Result<Element, Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    ) {
        self.handlers.insert(key.into(), Arc::new(handler));
    }

    /// Computes the route key for `epp_root` and dispatches to its handler.
    ///
    /// Returns `Err` with [`ResultCode::SyntaxError`] if the document isn't
    /// shaped like an EPP document at all, [`ResultCode::MissingParam`] if a
    /// command is missing a required child, and [`ResultCode::UnknownCommand`]
    /// if no handler is registered for the derived key.
    pub fn dispatch(
        &self,
        epp_root: &Element,
        registry: &NsRegistry,
    ) -> Result<Element, RouteError> {
        let key = route_key(epp_root, registry)?;
        let op_element = operation_element(epp_root)?;
        let handler = self
            .handlers
            .get(&key)
            .ok_or_else(|| RouteError::code(ResultCode::UnknownCommand, format!("no handler for {key}")))?;

        handler(op_element).map_err(|err| RouteError::code(ResultCode::CommandFailed, err.to_string()))
    }
}

/// A routing failure, carrying the result code it should be reported as.
#[derive(Debug)]
pub struct RouteError {
    pub code: ResultCode,
    pub message: String,
}

impl RouteError {
    fn code(code: ResultCode, message: impl Into<String>) -> Self {
        RouteError {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RouteError {}

/// Derives the route key for an `<epp>` document per the grammar in the
/// namespace registry's module documentation:
/// - `hello` → `"hello"`
/// - session commands → `"command/"+op`
/// - object commands → `"command/"+op+"/"+alias`, alias from the registry,
///   or the literal namespace URI if it's unregistered.
pub fn route_key(epp_root: &Element, registry: &NsRegistry) -> Result<String, RouteError> {
    if epp_root.name != "epp" || epp_root.ns.is_some() {
        return Err(RouteError::code(ResultCode::SyntaxError, "missing <epp> root"));
    }

    let top = epp_root
        .child_elements()
        .next()
        .ok_or_else(|| RouteError::code(ResultCode::SyntaxError, "<epp> has no child element"))?;

    if top.name == "hello" {
        return Ok("hello".to_string());
    }

    if top.name != "command" {
        return Err(RouteError::code(
            ResultCode::SyntaxError,
            format!("unexpected top-level element <{}>", top.name),
        ));
    }

    let op = top
        .child_elements()
        .find(|el| el.name != "clTRID" && el.name != "extension")
        .ok_or_else(|| RouteError::code(ResultCode::MissingParam, "<command> has no operation element"))?;

    if SESSION_OPS.contains(&op.name.as_str()) {
        return Ok(format!("command/{}", op.name));
    }

    if !OBJECT_OPS.contains(&op.name.as_str()) {
        return Err(RouteError::code(
            ResultCode::UnknownCommand,
            format!("unrecognised operation <{}>", op.name),
        ));
    }

    let object = op
        .child_elements()
        .next()
        .ok_or_else(|| RouteError::code(ResultCode::MissingParam, format!("<{}> has no object element", op.name)))?;

    let alias = match &object.ns {
        Some(uri) => registry.alias_for(uri).map(str::to_string).unwrap_or_else(|| uri.clone()),
        None => return Err(RouteError::code(ResultCode::SyntaxError, "object element has no namespace")),
    };

    Ok(format!("command/{}/{alias}", op.name))
}

/// The element a handler actually operates on: the object command's single
/// child for object operations, or the operation element itself for
/// session commands.
fn operation_element(epp_root: &Element) -> Result<&Element, RouteError> {
    let top = epp_root
        .child_elements()
        .next()
        .ok_or_else(|| RouteError::code(ResultCode::SyntaxError, "<epp> has no child element"))?;

    if top.name == "hello" {
        return Ok(top);
    }

    let op = top
        .child_elements()
        .find(|el| el.name != "clTRID" && el.name != "extension")
        .ok_or_else(|| RouteError::code(ResultCode::MissingParam, "<command> has no operation element"))?;

    if SESSION_OPS.contains(&op.name.as_str()) {
        return Ok(op);
    }

    op.child_elements()
        .next()
        .ok_or_else(|| RouteError::code(ResultCode::MissingParam, format!("<{}> has no object element", op.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse;

    fn registry() -> NsRegistry {
        NsRegistry::with_defaults()
    }

    #[test]
    fn hello_routes_to_hello() {
        let xml = br#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><hello/></epp>"#;
        let root = parse(xml).unwrap();
        assert_eq!(route_key(&root, &registry()).unwrap(), "hello");
    }

    #[test]
    fn login_routes_to_command_login() {
        let xml = br#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><command><login/><clTRID>abc</clTRID></command></epp>"#;
        let root = parse(xml).unwrap();
        assert_eq!(route_key(&root, &registry()).unwrap(), "command/login");
    }

    #[test]
    fn domain_check_routes_with_alias() {
        let xml = br#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
            <command>
                <check>
                    <domain:check xmlns:domain="urn:ietf:params:xml:ns:domain-1.0">
                        <domain:name>example.net</domain:name>
                    </domain:check>
                </check>
                <clTRID>abc</clTRID>
            </command>
        </epp>"#;
        let root = parse(xml).unwrap();
        assert_eq!(route_key(&root, &registry()).unwrap(), "command/check/domain");
    }

    #[test]
    fn unknown_namespace_resolves_to_literal_uri() {
        let xml = br#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
            <command>
                <info>
                    <widget:info xmlns:widget="urn:example:widget-1.0"/>
                </info>
                <clTRID>abc</clTRID>
            </command>
        </epp>"#;
        let root = parse(xml).unwrap();
        assert_eq!(
            route_key(&root, &registry()).unwrap(),
            "command/info/urn:example:widget-1.0"
        );
    }

    #[test]
    fn missing_epp_root_is_syntax_error() {
        let xml = br#"<notepp xmlns="urn:ietf:params:xml:ns:epp-1.0"/>"#;
        let root = parse(xml).unwrap();
        let err = route_key(&root, &registry()).unwrap_err();
        assert_eq!(err.code, ResultCode::SyntaxError);
    }

    #[test]
    fn dispatch_invokes_registered_handler() {
        let xml = br#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><hello/></epp>"#;
        let root = parse(xml).unwrap();
        let mut router = Router::new();
        router.register("hello", |_el| Ok(Element::new("greeting")));
        let out = router.dispatch(&root, &registry()).unwrap();
        assert_eq!(out.name, "greeting");
    }

    #[test]
    fn dispatch_reports_unknown_command() {
        let xml = br#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><hello/></epp>"#;
        let root = parse(xml).unwrap();
        let router = Router::new();
        let err = router.dispatch(&root, &registry()).unwrap_err();
        assert_eq!(err.code, ResultCode::UnknownCommand);
    }
}
