//! A synchronous EPP client.
//!
//! `djc-instant-epp`'s `EppClient` hands the connection to a background
//! task and talks to it over an `mpsc` channel, so several `EppClient`
//! handles can share one connection. `Client` does not: it owns its
//! [`Connector::Connection`] directly and every method takes `&mut self`,
//! which makes "one in-flight request at a time" a property the borrow
//! checker enforces rather than one the actor's request queue happens to
//! provide. There is exactly one connection per `Client` and no handle to
//! share.

mod connect;
pub mod dangerous;

pub use connect::{Connector, RustlsConnector};

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error};

use crate::error::Error;
use crate::frame::{read_frame, write_frame};
use crate::greeting::{Greeting, Hello};
use crate::registry::NsRegistry;
use crate::response::Response;
use crate::xml::{self, Element, ToElement};

/// A connected EPP client, holding the one TLS stream it speaks frames over.
pub struct Client<S> {
    stream: S,
    registry: NsRegistry,
    timeout: Duration,
    greeting_xml: String,
    greeting: Greeting,
    tr_id_counter: u64,
    tr_id_prefix: String,
}

/// Dials `connector` and reads the server's unsolicited greeting.
pub async fn dial<C: Connector>(
    connector: &C,
    registry: NsRegistry,
    tr_id_prefix: impl Into<String>,
    timeout: Duration,
) -> Result<Client<C::Connection>, Error> {
    let mut stream = connector.connect(timeout).await?;
    let body = read_frame(&mut stream, Some(timeout)).await?;
    let greeting = xml::decode::<Greeting>(&body)?;
    let greeting_xml = String::from_utf8_lossy(&body).into_owned();

    debug!(server_id = %greeting.server_id, "connected");

    Ok(Client {
        stream,
        registry,
        timeout,
        greeting_xml,
        greeting,
        tr_id_counter: 0,
        tr_id_prefix: tr_id_prefix.into(),
    })
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// The greeting received when the connection was established.
    pub fn greeting(&self) -> &Greeting {
        &self.greeting
    }

    /// The greeting received when the connection was established, as the
    /// raw XML the server sent.
    pub fn greeting_xml(&self) -> &str {
        &self.greeting_xml
    }

    /// Sends a `<hello/>` and returns the fresh greeting the server replies
    /// with (RFC 5730 §2.10.1).
    pub async fn hello(&mut self) -> Result<Greeting, Error> {
        let xml = xml::encode(&Hello, &[], &self.registry)?;
        let response = self.send(&xml).await?;
        Ok(xml::decode::<Greeting>(response.as_bytes())?)
    }

    /// Logs in as `user`/`pw`, advertising the object and extension URIs the
    /// server itself offered in its greeting (RFC 5730 §2.4.2.1; requesting
    /// exactly what was offered is the common case). For a different object
    /// set, extension set, or a password change, build a
    /// [`crate::login::Login`] directly and use [`Client::login_with`].
    ///
    /// A non-success result code is reported as [`Error::Command`], not a
    /// successful return carrying a failure — callers should not need to
    /// check `result.code.is_success()` themselves.
    pub async fn login(&mut self, user: &str, pw: &str) -> Result<Response, Error> {
        let login = crate::login::Login {
            client_id: user.to_string(),
            password: pw.to_string(),
            new_password: None,
            options: crate::login::LoginOptions {
                version: self.greeting.service_menu.versions.first().cloned().unwrap_or_else(|| "1.0".to_string()),
                language: self.greeting.service_menu.languages.first().cloned().unwrap_or_else(|| "en".to_string()),
            },
            services: crate::login::LoginServices {
                object_uris: self.greeting.service_menu.object_uris.clone(),
                extension_uris: self.greeting.service_menu.extension_uris.clone(),
            },
        };
        self.login_with(login).await
    }

    /// Logs in with a caller-assembled [`crate::login::Login`] document; see
    /// [`Client::login`] for the common-case convenience.
    pub async fn login_with(&mut self, login: crate::login::Login) -> Result<Response, Error> {
        self.transact(login).await
    }

    /// Serialises `command` as `<command>{command}<clTRID>...</clTRID></command>`,
    /// sends it, and decodes the `<response>`.
    pub async fn transact<T: ToElement>(&mut self, command: T) -> Result<Response, Error> {
        let tr_id = self.next_tr_id();
        let envelope = CommandEnvelope {
            command: &command,
            client_tr_id: &tr_id,
        };
        let xml = xml::encode(&envelope, &[], &self.registry)?;

        debug!(tr_id = %tr_id, "request: {}", &xml);
        let body = self.send(&xml).await?;
        debug!(tr_id = %tr_id, "response: {}", &body);

        let response = xml::decode::<Response>(body.as_bytes())?;
        debug_assert_eq!(response.tr_ids.client_tr_id.as_deref(), Some(tr_id.as_str()));

        if response.result.code.is_success() {
            return Ok(response);
        }

        let err = Error::Command(Box::new(crate::response::ResponseStatus {
            result: response.result,
            tr_ids: response.tr_ids,
        }));
        error!("command failed: {err}");
        Err(err)
    }

    /// Sends an already-serialised `<epp>` document and returns the raw XML
    /// of the response. Exposed for debugging and for commands this crate
    /// does not model as a typed document.
    pub async fn send(&mut self, xml: &str) -> Result<String, Error> {
        write_frame(&mut self.stream, xml.as_bytes(), Some(self.timeout)).await?;
        let body = read_frame(&mut self.stream, Some(self.timeout)).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn next_tr_id(&mut self) -> String {
        self.tr_id_counter += 1;
        format!("{}-{:06}", self.tr_id_prefix, self.tr_id_counter)
    }
}

/// Wraps a single operation document in a `<command>...<clTRID>` envelope.
struct CommandEnvelope<'a, T> {
    command: &'a T,
    client_tr_id: &'a str,
}

impl<'a, T: ToElement> ToElement for CommandEnvelope<'a, T> {
    fn to_element(&self) -> Element {
        Element::new("command")
            .child(self.command.to_element())
            .child(Element::new("clTRID").text(self.client_tr_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EPP_SCHEMA_LOCATION;
    use crate::greeting::{Dcp, DcpAccess, DcpRecipient, DcpRetention, DcpStatement, ServiceMenu};
    use crate::login::{Login, LoginOptions, LoginServices};
    use crate::response::{EppResult, ResponseTrId};
    use crate::result::ResultCode;
    use tokio_test::io::Builder;

    const TEST_ROOT_ATTRS: &[(&str, &str)] = &[
        ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ("xsi:schemaLocation", EPP_SCHEMA_LOCATION),
    ];

    fn sample_greeting() -> Greeting {
        Greeting {
            server_id: "Test EPP server".to_string(),
            server_date: "2026-08-01T00:00:00Z".parse().unwrap(),
            service_menu: ServiceMenu {
                versions: vec!["1.0".to_string()],
                languages: vec!["en".to_string()],
                object_uris: vec!["urn:ietf:params:xml:ns:domain-1.0".to_string()],
                extension_uris: vec![],
            },
            dcp: Dcp {
                access: DcpAccess::All,
                statement: DcpStatement {
                    purpose: vec![],
                    recipient: DcpRecipient::default(),
                    retention: DcpRetention::None,
                },
                expiry: None,
            },
        }
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let total_size = (payload.len() + 4) as u32;
        let mut buf = total_size.to_be_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf
    }

    fn login_payload() -> Login {
        Login {
            client_id: "ClientX".to_string(),
            password: "wrong".to_string(),
            new_password: None,
            options: LoginOptions {
                version: "1.0".to_string(),
                language: "en".to_string(),
            },
            services: LoginServices::default(),
        }
    }

    #[tokio::test]
    async fn connect_reads_and_decodes_the_greeting() {
        let registry = NsRegistry::with_defaults();
        let greeting_xml = xml::encode(&sample_greeting(), TEST_ROOT_ATTRS, &registry).unwrap();
        let mut mock = Builder::new().read(&framed(greeting_xml.as_bytes())).build();

        let body = read_frame(&mut mock, None).await.unwrap();
        let greeting = xml::decode::<Greeting>(&body).unwrap();

        assert_eq!(greeting.server_id, "Test EPP server");
    }

    #[tokio::test]
    async fn login_surfaces_command_failure() {
        let registry = NsRegistry::with_defaults();
        let greeting_xml = xml::encode(&sample_greeting(), TEST_ROOT_ATTRS, &registry).unwrap();

        let failure = Response {
            result: EppResult::with_reason(ResultCode::AuthenticationError, "bad password"),
            message_queue: None,
            res_data: None,
            extension: None,
            tr_ids: ResponseTrId {
                client_tr_id: Some("test-000001".to_string()),
                server_tr_id: "srv-1".to_string(),
            },
        };
        let failure_xml = xml::encode(&failure, &[], &registry).unwrap();

        let request_xml = xml::encode(
            &CommandEnvelope {
                command: &login_payload(),
                client_tr_id: "test-000001",
            },
            &[],
            &registry,
        )
        .unwrap();

        let mock = Builder::new()
            .read(&framed(greeting_xml.as_bytes()))
            .write(&framed(request_xml.as_bytes()))
            .read(&framed(failure_xml.as_bytes()))
            .build();

        let mut client = Client {
            stream: mock,
            registry,
            timeout: Duration::from_secs(30),
            greeting_xml,
            greeting: sample_greeting(),
            tr_id_counter: 0,
            tr_id_prefix: "test".to_string(),
        };

        let err = client.login_with(login_payload()).await.unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }

    #[tokio::test]
    async fn login_advertises_the_greetings_object_and_extension_uris() {
        let registry = NsRegistry::with_defaults();
        let greeting = sample_greeting();
        let greeting_xml = xml::encode(&greeting, TEST_ROOT_ATTRS, &registry).unwrap();

        let expected_login = Login {
            client_id: "ClientX".to_string(),
            password: "foo-BAR2".to_string(),
            new_password: None,
            options: LoginOptions {
                version: "1.0".to_string(),
                language: "en".to_string(),
            },
            services: LoginServices {
                object_uris: greeting.service_menu.object_uris.clone(),
                extension_uris: greeting.service_menu.extension_uris.clone(),
            },
        };
        let request_xml = xml::encode(
            &CommandEnvelope {
                command: &expected_login,
                client_tr_id: "test-000001",
            },
            &[],
            &registry,
        )
        .unwrap();

        let success = Response {
            result: EppResult::new(ResultCode::CompletedSuccessfully),
            message_queue: None,
            res_data: None,
            extension: None,
            tr_ids: ResponseTrId {
                client_tr_id: Some("test-000001".to_string()),
                server_tr_id: "srv-1".to_string(),
            },
        };
        let success_xml = xml::encode(&success, &[], &registry).unwrap();

        let mock = Builder::new()
            .read(&framed(greeting_xml.as_bytes()))
            .write(&framed(request_xml.as_bytes()))
            .read(&framed(success_xml.as_bytes()))
            .build();

        let mut client = Client {
            stream: mock,
            registry,
            timeout: Duration::from_secs(30),
            greeting_xml,
            greeting,
            tr_id_counter: 0,
            tr_id_prefix: "test".to_string(),
        };

        client.login("ClientX", "foo-BAR2").await.unwrap();
    }
}
