//! The per-connection session engine (spec §4.6).
//!
//! One [`Session`] runs entirely on the worker that accepted its
//! connection: GREETING, then a IDLE/VALIDATING/HANDLING/WRITING loop until
//! a timeout, the stop signal, a terminal result code, or a fatal error
//! ends it. The original Go server's `processConnection` only ever handles
//! one command before returning (see its trailing `break`); this engine
//! generalises that into the spec's full per-session loop while keeping the
//! same read/write/greet shape.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use uuid::Uuid;

use crate::common::{Certificate, EPP_SCHEMA_LOCATION};
use crate::error::Error;
use crate::frame;
use crate::greeting::Greeting;
use crate::registry::NsRegistry;
use crate::response::{EppResult, Response, ResponseTrId};
use crate::result::ResultCode;
use crate::validator::Validator;
use crate::xml::ToElement;

/// Server-side `xmlns:xsi`/`xsi:schemaLocation` attributes (spec §4.3/§6).
fn server_root_attrs() -> [(&'static str, &'static str); 2] {
    [
        ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ("xsi:schemaLocation", EPP_SCHEMA_LOCATION),
    ]
}

/// Per-session key-value storage for caller-supplied handlers, e.g.
/// "authenticated as clID X" between commands. Generalises the original Go
/// session's `Data map[string]interface{}` field.
#[derive(Default)]
pub struct Scratch(HashMap<String, Box<dyn Any + Send>>);

impl Scratch {
    pub fn insert<T: Send + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.0.insert(key.into(), Box::new(value));
    }

    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.0.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.0.get_mut(key).and_then(|v| v.downcast_mut())
    }

    pub fn remove<T: 'static>(&mut self, key: &str) -> Option<T> {
        self.0.remove(key).and_then(|v| v.downcast().ok()).map(|b| *b)
    }
}

impl std::fmt::Debug for Scratch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scratch").field("len", &self.0.len()).finish()
    }
}

/// What a handler or the greeting producer sees of the session it's running
/// inside: identity, peer certificates, and scratch storage. Deliberately
/// does not expose the transport itself.
pub struct SessionContext<'a> {
    pub id: Uuid,
    pub peer_certificates: &'a [Certificate],
    pub scratch: &'a mut Scratch,
}

/// The root handler contract (spec §6): receives a full inbound `<epp>`
/// document and must return a full, already-encoded `<epp>` response
/// document. Typically a [`crate::router::Router`] wrapped in a closure
/// that re-encodes whatever `Element` the router produced.
pub type Handler = Arc<
    dyn Fn(&mut SessionContext<'_>, &[u8]) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync,
>;

/// Produces the `<greeting>` document sent unsolicited at connect.
pub type GreetingProducer = Arc<dyn Fn(&mut SessionContext<'_>) -> Greeting + Send + Sync>;

/// Tunables for a session's timeout and error-reporting behaviour.
#[derive(Clone)]
pub struct SessionConfig {
    /// Maximum wall time between the end of one write and the start of the
    /// next inbound frame; reset on each successful write.
    pub idle_timeout: Duration,
    /// Maximum total wall time for the session, measured from GREETING
    /// emission; never reset.
    pub session_timeout: Duration,
    /// How often the IDLE state wakes up to check the stop signal and the
    /// two deadlines above, by bounding each frame read attempt.
    pub read_poll_interval: Duration,
    /// Deadline applied to each frame write.
    pub write_timeout: Duration,
    /// Result code used to report an `Err` returned by the handler.
    ///
    /// RFC 5730 leaves the choice between "command failed" (2400, session
    /// stays open) and "command failed; ending session" (2500) to the
    /// server; this crate defaults to 2500, treating an opaque handler
    /// error as evidence the session may be in a bad state.
    pub handler_error_code: ResultCode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            idle_timeout: Duration::from_secs(600),
            session_timeout: Duration::from_secs(24 * 60 * 60),
            read_poll_interval: Duration::from_secs(1),
            write_timeout: Duration::from_secs(10),
            handler_error_code: ResultCode::CommandFailedEndingSession,
        }
    }
}

/// Why a session's [`Session::run`] returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CloseReason {
    GreetingFailed,
    IdleTimeout,
    SessionTimeout,
    Stopped,
    Io,
    ValidationFailed,
    HandlerError,
    TerminalResultCode,
}

/// One connection's worth of protocol state (spec §3 "Session").
pub struct Session<S> {
    pub id: Uuid,
    stream: S,
    peer_certificates: Vec<Certificate>,
    scratch: Scratch,
    config: SessionConfig,
    registry: Arc<NsRegistry>,
    greeting: GreetingProducer,
    handler: Handler,
    validator: Option<Box<dyn Validator>>,
    stop: watch::Receiver<bool>,
    tr_id_counter: u64,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        stream: S,
        peer_certificates: Vec<Certificate>,
        config: SessionConfig,
        registry: Arc<NsRegistry>,
        greeting: GreetingProducer,
        handler: Handler,
        validator: Option<Box<dyn Validator>>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Session {
            id,
            stream,
            peer_certificates,
            scratch: Scratch::default(),
            config,
            registry,
            greeting,
            handler,
            validator,
            stop,
            tr_id_counter: 0,
        }
    }

    /// Drives the session to completion: GREETING, then the IDLE loop,
    /// until something ends it. The validator's `free` (spec §4.9: called
    /// exactly once, regardless of how the session ends) is invoked here
    /// once for every exit path out of [`Session::run_loop`], rather than
    /// duplicated at each `return` inside the loop.
    pub async fn run(mut self) -> CloseReason {
        let reason = self.run_loop().await;
        if let Some(validator) = self.validator.as_mut() {
            validator.free();
        }
        reason
    }

    async fn run_loop(&mut self) -> CloseReason {
        if self.emit_greeting().await.is_err() {
            return CloseReason::GreetingFailed;
        }

        let session_deadline = Instant::now() + self.config.session_timeout;
        let mut idle_deadline = Instant::now() + self.config.idle_timeout;

        loop {
            if *self.stop.borrow() {
                return CloseReason::Stopped;
            }

            let now = Instant::now();
            if now >= session_deadline {
                return CloseReason::SessionTimeout;
            }
            if now >= idle_deadline {
                return CloseReason::IdleTimeout;
            }

            let poll = self
                .config
                .read_poll_interval
                .min(session_deadline.saturating_duration_since(now))
                .min(idle_deadline.saturating_duration_since(now));

            let body = match frame::read_frame(&mut self.stream, Some(poll)).await {
                Ok(body) => body,
                Err(Error::Timeout) => continue,
                Err(_) => return CloseReason::Io,
            };

            if let Some(validator) = self.validator.as_mut() {
                if let Err(e) = validator.validate(&body) {
                    let _ = self
                        .write_error_response(&body, ResultCode::SyntaxError, &e.0)
                        .await;
                    return CloseReason::ValidationFailed;
                }
            }

            let mut ctx = SessionContext {
                id: self.id,
                peer_certificates: &self.peer_certificates,
                scratch: &mut self.scratch,
            };
            let response_bytes = match (self.handler)(&mut ctx, &body) {
                Ok(bytes) => bytes,
                Err(err) => {
                    let code = self.config.handler_error_code;
                    let _ = self.write_error_response(&body, code, &err.to_string()).await;
                    return CloseReason::HandlerError;
                }
            };

            if let Some(validator) = self.validator.as_mut() {
                if validator.validate(&response_bytes).is_err() {
                    return CloseReason::ValidationFailed;
                }
            }

            if frame::write_frame(&mut self.stream, &response_bytes, Some(self.config.write_timeout))
                .await
                .is_err()
            {
                return CloseReason::Io;
            }
            idle_deadline = Instant::now() + self.config.idle_timeout;

            if terminal(&response_bytes) {
                return CloseReason::TerminalResultCode;
            }
        }
    }

    async fn emit_greeting(&mut self) -> Result<(), Error> {
        let mut ctx = SessionContext {
            id: self.id,
            peer_certificates: &self.peer_certificates,
            scratch: &mut self.scratch,
        };
        let greeting = (self.greeting)(&mut ctx);
        let xml = crate::xml::encode(&greeting, &server_root_attrs(), &self.registry)?;

        if let Some(validator) = self.validator.as_mut() {
            validator.validate(xml.as_bytes())?;
        }

        frame::write_frame(&mut self.stream, xml.as_bytes(), Some(self.config.write_timeout)).await
    }

    async fn write_error_response(
        &mut self,
        inbound: &[u8],
        code: ResultCode,
        reason: &str,
    ) -> Result<(), Error> {
        let response = Response {
            result: EppResult::with_reason(code, reason),
            message_queue: None,
            res_data: None,
            extension: None,
            tr_ids: ResponseTrId {
                client_tr_id: extract_cl_trid(inbound),
                server_tr_id: self.next_tr_id(),
            },
        };
        let xml = crate::xml::encode(&response, &server_root_attrs(), &self.registry)?;
        frame::write_frame(&mut self.stream, xml.as_bytes(), Some(self.config.write_timeout)).await
    }

    fn next_tr_id(&mut self) -> String {
        self.tr_id_counter += 1;
        format!("{}-{:06}", self.id.as_simple(), self.tr_id_counter)
    }
}

fn extract_cl_trid(inbound: &[u8]) -> Option<String> {
    let root = crate::xml::parse(inbound).ok()?;
    let command = root.find(None, "command")?;
    command.find(None, "clTRID").and_then(|el| el.text_content())
}

fn terminal(response_bytes: &[u8]) -> bool {
    crate::xml::decode::<Response>(response_bytes)
        .map(|r| r.result.code.is_terminal())
        .unwrap_or(false)
}
