//! Crate-wide error type

use std::num::TryFromIntError;

use crate::result::ResultCode;

/// Errors returned by the client, the session engine, and the codec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O failure on the transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame header was malformed or its declared size was out of bounds.
    #[error("framing error: {0}")]
    Framing(#[from] FrameError),

    /// A read or write did not complete before its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The XML document could not be parsed or encoded.
    #[error("xml error: {0}")]
    Xml(#[from] crate::xml::XmlError),

    /// TLS handshake or configuration failure.
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// The connection's I/O half has gone away.
    #[error("connection closed")]
    Closed,

    /// A reconnect attempt failed; the connection can no longer be trusted.
    #[error("reconnect failed")]
    Reconnect,

    /// The registry returned a non-success EPP result for a transaction.
    #[error("command failed: {0:?}")]
    Command(Box<crate::response::ResponseStatus>),

    /// A configured validator rejected a payload.
    #[error("validation error: {0}")]
    Validation(#[from] crate::validator::ValidationError),

    /// Any other error, wrapped so it can cross an `async_trait` boundary.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<TryFromIntError> for Error {
    fn from(_: TryFromIntError) -> Self {
        Error::Framing(FrameError::PayloadTooLarge)
    }
}

/// Errors specific to the length-prefixed frame transport (RFC 5734 §4).
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum FrameError {
    /// The 4-byte length header could not be read in full.
    #[error("could not read frame header")]
    MissingHeader,

    /// `total_size` was smaller than the 4-byte header itself.
    #[error("frame declares a total size smaller than the header")]
    TooShort,

    /// The payload would not fit in a `u32` length prefix.
    #[error("payload too large to frame")]
    PayloadTooLarge,
}

/// Converts a server-side error outcome into the EPP result code that should
/// be reported to the client, where that mapping is meaningful.
pub(crate) fn as_result_code(err: &Error) -> Option<ResultCode> {
    match err {
        Error::Xml(_) => Some(ResultCode::SyntaxError),
        Error::Validation(_) => Some(ResultCode::SyntaxError),
        _ => None,
    }
}
