//! Types for the EPP greeting (RFC 5730 §2.4).
//!
//! The server sends one greeting, unsolicited, as soon as a connection's TLS
//! handshake completes; a client may also request a fresh one with
//! `<hello/>`. Field shapes follow the original Go server's
//! `types.Greeting`/`types.DCP`.

use chrono::{DateTime, Utc};

use crate::xml::{Element, FromElement, ToElement, XmlError};

/// A `<hello/>` request: no fields, just the empty element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hello;

impl ToElement for Hello {
    fn to_element(&self) -> Element {
        Element::new("hello")
    }
}

impl FromElement for Hello {
    fn from_element(_el: &Element) -> Result<Self, XmlError> {
        Ok(Hello)
    }
}

/// The `<greeting>` document.
#[derive(Clone, Debug, PartialEq)]
pub struct Greeting {
    pub server_id: String,
    pub server_date: DateTime<Utc>,
    pub service_menu: ServiceMenu,
    pub dcp: Dcp,
}

/// The `<svcMenu>` block: protocol versions, languages, and the object and
/// extension namespaces this server understands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceMenu {
    pub versions: Vec<String>,
    pub languages: Vec<String>,
    pub object_uris: Vec<String>,
    pub extension_uris: Vec<String>,
}

/// The `<dcp>` (data collection policy) block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dcp {
    pub access: DcpAccess,
    pub statement: DcpStatement,
    pub expiry: Option<DcpExpiry>,
}

/// One of the mutually exclusive `<access>` choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DcpAccess {
    All,
    None,
    Null,
    Other,
    Personal,
    PersonalAndOther,
}

/// The `<expiry>` block: either an absolute timestamp or a relative duration
/// in the `PnYnMnDTnHnMnS` form (RFC 5730 §2.4, not validated by this crate).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DcpExpiry {
    Absolute(DateTime<Utc>),
    Relative(String),
}

/// The `<statement>` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DcpStatement {
    pub purpose: Vec<DcpPurpose>,
    pub recipient: DcpRecipient,
    pub retention: DcpRetention,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DcpPurpose {
    Admin,
    Contact,
    Other,
    Prov,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DcpRecipient {
    pub other: bool,
    pub ours: Vec<Option<String>>,
    pub public: bool,
    pub same: bool,
    pub unrelated: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DcpRetention {
    Business,
    Indefinite,
    Legal,
    None,
    Stated,
}

impl ToElement for Greeting {
    fn to_element(&self) -> Element {
        Element::new("greeting")
            .child(Element::new("svID").text(self.server_id.clone()))
            .child(Element::new("svDate").text(self.server_date.to_rfc3339()))
            .child(self.service_menu.to_element())
            .child(self.dcp.to_element())
    }
}

impl FromElement for Greeting {
    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let server_id = el
            .find(None, "svID")
            .and_then(Element::text_content)
            .ok_or_else(|| XmlError::Missing("greeting/svID".to_string()))?;
        let server_date = el
            .find(None, "svDate")
            .and_then(Element::text_content)
            .ok_or_else(|| XmlError::Missing("greeting/svDate".to_string()))?;
        let server_date = DateTime::parse_from_rfc3339(&server_date)
            .map_err(|_| XmlError::Unexpected("greeting/svDate is not a valid timestamp".to_string()))?
            .with_timezone(&Utc);
        let service_menu = el
            .find(None, "svcMenu")
            .ok_or_else(|| XmlError::Missing("greeting/svcMenu".to_string()))
            .and_then(ServiceMenu::from_element)?;
        let dcp = el
            .find(None, "dcp")
            .ok_or_else(|| XmlError::Missing("greeting/dcp".to_string()))
            .and_then(Dcp::from_element)?;

        Ok(Greeting {
            server_id,
            server_date,
            service_menu,
            dcp,
        })
    }
}

impl ServiceMenu {
    fn to_element(&self) -> Element {
        Element::new("svcMenu")
            .children(self.versions.iter().map(|v| Element::new("version").text(v.clone())))
            .children(self.languages.iter().map(|l| Element::new("lang").text(l.clone())))
            .children(self.object_uris.iter().map(|u| Element::new("objURI").text(u.clone())))
            .maybe_child(if self.extension_uris.is_empty() {
                None
            } else {
                Some(Element::new("svcExtension").children(
                    self.extension_uris
                        .iter()
                        .map(|u| Element::new("extURI").text(u.clone())),
                ))
            })
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let versions = text_children(el, "version");
        let languages = text_children(el, "lang");
        let object_uris = text_children(el, "objURI");
        let extension_uris = el
            .find(None, "svcExtension")
            .map(|ext| text_children(ext, "extURI"))
            .unwrap_or_default();

        Ok(ServiceMenu {
            versions,
            languages,
            object_uris,
            extension_uris,
        })
    }
}

fn text_children(el: &Element, name: &str) -> Vec<String> {
    el.child_elements()
        .filter(|c| c.name == name)
        .filter_map(Element::text_content)
        .collect()
}

impl Dcp {
    fn to_element(&self) -> Element {
        Element::new("dcp")
            .child(self.access.to_element())
            .child(self.statement.to_element())
            .maybe_child(self.expiry.as_ref().map(DcpExpiry::to_element))
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let access = el
            .find(None, "access")
            .ok_or_else(|| XmlError::Missing("dcp/access".to_string()))
            .and_then(DcpAccess::from_element)?;
        let statement = el
            .find(None, "statement")
            .ok_or_else(|| XmlError::Missing("dcp/statement".to_string()))
            .and_then(DcpStatement::from_element)?;
        let expiry = el.find(None, "expiry").map(DcpExpiry::from_element).transpose()?;

        Ok(Dcp {
            access,
            statement,
            expiry,
        })
    }
}

impl DcpAccess {
    fn to_element(self) -> Element {
        let name = match self {
            DcpAccess::All => "all",
            DcpAccess::None => "none",
            DcpAccess::Null => "null",
            DcpAccess::Other => "other",
            DcpAccess::Personal => "personal",
            DcpAccess::PersonalAndOther => "personalAndOther",
        };
        Element::new("access").child(Element::new(name))
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let child = el
            .child_elements()
            .next()
            .ok_or_else(|| XmlError::Missing("dcp/access child".to_string()))?;
        match child.name.as_str() {
            "all" => Ok(DcpAccess::All),
            "none" => Ok(DcpAccess::None),
            "null" => Ok(DcpAccess::Null),
            "other" => Ok(DcpAccess::Other),
            "personal" => Ok(DcpAccess::Personal),
            "personalAndOther" => Ok(DcpAccess::PersonalAndOther),
            other => Err(XmlError::Unexpected(format!("unknown dcp/access choice <{other}>"))),
        }
    }
}

impl DcpExpiry {
    fn to_element(&self) -> Element {
        match self {
            DcpExpiry::Absolute(ts) => {
                Element::new("expiry").child(Element::new("absolute").text(ts.to_rfc3339()))
            }
            DcpExpiry::Relative(period) => {
                Element::new("expiry").child(Element::new("relative").text(period.clone()))
            }
        }
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        if let Some(abs) = el.find(None, "absolute").and_then(Element::text_content) {
            let ts = DateTime::parse_from_rfc3339(&abs)
                .map_err(|_| XmlError::Unexpected("dcp/expiry/absolute is not a valid timestamp".to_string()))?
                .with_timezone(&Utc);
            return Ok(DcpExpiry::Absolute(ts));
        }
        if let Some(rel) = el.find(None, "relative").and_then(Element::text_content) {
            return Ok(DcpExpiry::Relative(rel));
        }
        Err(XmlError::Missing("dcp/expiry/{absolute,relative}".to_string()))
    }
}

impl DcpStatement {
    fn to_element(&self) -> Element {
        Element::new("statement")
            .children(self.purpose.iter().map(|p| p.to_element()))
            .child(self.recipient.to_element())
            .child(self.retention.to_element())
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let purpose_el = el
            .find(None, "purpose")
            .ok_or_else(|| XmlError::Missing("dcp/statement/purpose".to_string()))?;
        let purpose = purpose_el
            .child_elements()
            .filter_map(|c| DcpPurpose::from_name(&c.name))
            .collect();
        let recipient = el
            .find(None, "recipient")
            .ok_or_else(|| XmlError::Missing("dcp/statement/recipient".to_string()))
            .and_then(DcpRecipient::from_element)?;
        let retention = el
            .find(None, "retention")
            .ok_or_else(|| XmlError::Missing("dcp/statement/retention".to_string()))
            .and_then(DcpRetention::from_element)?;

        Ok(DcpStatement {
            purpose,
            recipient,
            retention,
        })
    }
}

impl DcpPurpose {
    fn name(self) -> &'static str {
        match self {
            DcpPurpose::Admin => "admin",
            DcpPurpose::Contact => "contact",
            DcpPurpose::Other => "other",
            DcpPurpose::Prov => "prov",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "admin" => Some(DcpPurpose::Admin),
            "contact" => Some(DcpPurpose::Contact),
            "other" => Some(DcpPurpose::Other),
            "prov" => Some(DcpPurpose::Prov),
            _ => None,
        }
    }

    fn to_element(self) -> Element {
        Element::new(self.name())
    }
}

impl DcpRecipient {
    fn to_element(&self) -> Element {
        Element::new("recipient")
            .maybe_child(self.other.then(|| Element::new("other")))
            .children(self.ours.iter().map(|desc| {
                let el = Element::new("ours");
                match desc {
                    Some(desc) => el.child(Element::new("recDesc").text(desc.clone())),
                    None => el,
                }
            }))
            .maybe_child(self.public.then(|| Element::new("public")))
            .maybe_child(self.same.then(|| Element::new("same")))
            .maybe_child(self.unrelated.then(|| Element::new("unrelated")))
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        Ok(DcpRecipient {
            other: el.find(None, "other").is_some(),
            ours: el
                .child_elements()
                .filter(|c| c.name == "ours")
                .map(|c| c.find(None, "recDesc").and_then(Element::text_content))
                .collect(),
            public: el.find(None, "public").is_some(),
            same: el.find(None, "same").is_some(),
            unrelated: el.find(None, "unrelated").is_some(),
        })
    }
}

impl DcpRetention {
    fn name(self) -> &'static str {
        match self {
            DcpRetention::Business => "business",
            DcpRetention::Indefinite => "indefinite",
            DcpRetention::Legal => "legal",
            DcpRetention::None => "none",
            DcpRetention::Stated => "stated",
        }
    }

    fn to_element(self) -> Element {
        Element::new("retention").child(Element::new(self.name()))
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let child = el
            .child_elements()
            .next()
            .ok_or_else(|| XmlError::Missing("dcp/retention child".to_string()))?;
        match child.name.as_str() {
            "business" => Ok(DcpRetention::Business),
            "indefinite" => Ok(DcpRetention::Indefinite),
            "legal" => Ok(DcpRetention::Legal),
            "none" => Ok(DcpRetention::None),
            "stated" => Ok(DcpRetention::Stated),
            other => Err(XmlError::Unexpected(format!("unknown dcp/retention choice <{other}>"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Greeting {
        Greeting {
            server_id: "Example EPP server epp.example.com".to_string(),
            server_date: "2026-08-01T12:00:00Z".parse().unwrap(),
            service_menu: ServiceMenu {
                versions: vec!["1.0".to_string()],
                languages: vec!["en".to_string()],
                object_uris: vec!["urn:ietf:params:xml:ns:domain-1.0".to_string()],
                extension_uris: vec!["urn:ietf:params:xml:ns:secDNS-1.1".to_string()],
            },
            dcp: Dcp {
                access: DcpAccess::All,
                statement: DcpStatement {
                    purpose: vec![DcpPurpose::Admin, DcpPurpose::Prov],
                    recipient: DcpRecipient {
                        other: false,
                        ours: vec![],
                        public: false,
                        same: true,
                        unrelated: false,
                    },
                    retention: DcpRetention::Stated,
                },
                expiry: Some(DcpExpiry::Relative("P1Y".to_string())),
            },
        }
    }

    #[test]
    fn greeting_round_trips_through_element() {
        let greeting = sample();
        let el = greeting.to_element();
        let back = Greeting::from_element(&el).unwrap();
        assert_eq!(back, greeting);
    }

    #[test]
    fn service_menu_preserves_object_and_extension_uris() {
        let el = sample().service_menu.to_element();
        let back = ServiceMenu::from_element(&el).unwrap();
        assert_eq!(back.object_uris, vec!["urn:ietf:params:xml:ns:domain-1.0"]);
        assert_eq!(back.extension_uris, vec!["urn:ietf:params:xml:ns:secDNS-1.1"]);
    }

    #[test]
    fn hello_has_no_fields() {
        let el = Hello.to_element();
        assert_eq!(el.name, "hello");
        assert!(el.children.is_empty());
    }
}
