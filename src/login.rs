//! Types for the `<login>` command (RFC 5730 §2.9.1.1).

use crate::xml::{Element, FromElement, ToElement, XmlError};

/// A `<command><login>...</login></command>` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Login {
    pub client_id: String,
    pub password: String,
    pub new_password: Option<String>,
    pub options: LoginOptions,
    pub services: LoginServices,
}

/// The `<options>` block: protocol version and language.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginOptions {
    pub version: String,
    pub language: String,
}

/// The `<svcs>` block: object namespaces and extension namespaces the
/// client intends to use during the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoginServices {
    pub object_uris: Vec<String>,
    pub extension_uris: Vec<String>,
}

impl ToElement for Login {
    fn to_element(&self) -> Element {
        Element::new("login")
            .child(Element::new("clID").text(self.client_id.clone()))
            .child(Element::new("pw").text(self.password.clone()))
            .maybe_child(
                self.new_password
                    .as_ref()
                    .map(|pw| Element::new("newPW").text(pw.clone())),
            )
            .child(self.options.to_element())
            .child(self.services.to_element())
    }
}

impl FromElement for Login {
    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let client_id = el
            .find(None, "clID")
            .and_then(Element::text_content)
            .ok_or_else(|| XmlError::Missing("login/clID".to_string()))?;
        let password = el
            .find(None, "pw")
            .and_then(Element::text_content)
            .ok_or_else(|| XmlError::Missing("login/pw".to_string()))?;
        let new_password = el.find(None, "newPW").and_then(Element::text_content);
        let options = el
            .find(None, "options")
            .ok_or_else(|| XmlError::Missing("login/options".to_string()))
            .and_then(LoginOptions::from_element)?;
        let services = el
            .find(None, "svcs")
            .ok_or_else(|| XmlError::Missing("login/svcs".to_string()))
            .and_then(LoginServices::from_element)?;

        Ok(Login {
            client_id,
            password,
            new_password,
            options,
            services,
        })
    }
}

impl LoginOptions {
    fn to_element(&self) -> Element {
        Element::new("options")
            .child(Element::new("version").text(self.version.clone()))
            .child(Element::new("lang").text(self.language.clone()))
    }

    fn from_element(el: &Element) -> Result<Self, XmlError> {
        let version = el
            .find(None, "version")
            .and_then(Element::text_content)
            .ok_or_else(|| XmlError::Missing("login/options/version".to_string()))?;
        let language = el
            .find(None, "lang")
            .and_then(Element::text_content)
            .ok_or_else(|| XmlError::Missing("login/options/lang".to_string()))?;
        Ok(LoginOptions { version, language })
    }
}

impl LoginServices {
    fn to_element(&self) -> Element {
        Element::new("svcs")
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
        let object_uris = el
            .child_elements()
            .filter(|c| c.name == "objURI")
            .filter_map(Element::text_content)
            .collect();
        let extension_uris = el
            .find(None, "svcExtension")
            .map(|ext| {
                ext.child_elements()
                    .filter(|c| c.name == "extURI")
                    .filter_map(Element::text_content)
                    .collect()
            })
            .unwrap_or_default();

        Ok(LoginServices {
            object_uris,
            extension_uris,
        })
    }
}
