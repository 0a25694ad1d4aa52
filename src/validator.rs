//! The schema-validator collaborator interface (spec §4.9).
//!
//! A [`Validator`] is optional and session-scoped: when configured, the
//! session engine calls `validate` on both inbound and outbound bodies and
//! calls `free` exactly once when the session ends. Absent a validator, all
//! payloads are treated as valid — this crate deliberately does not ship an
//! XSD implementation; schema validation is a pluggable concern.

/// A collaborator that checks EPP XML against a schema.
///
/// Implementations are expected to be cheap to invoke repeatedly but may
/// hold expensive state (a compiled schema set); `free` gives them a point
/// to release it deterministically rather than relying on `Drop` timing.
pub trait Validator: Send {
    /// Checks `xml` against the configured schema set.
    fn validate(&mut self, xml: &[u8]) -> Result<(), ValidationError>;

    /// Releases any resources held by this validator. Idempotent: may be
    /// called more than once (e.g. on an error path and again at session
    /// end) without effect beyond the first call.
    fn free(&mut self) {}
}

/// A schema validation failure, surfaced to the peer as `SyntaxError`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// A validator that accepts everything; used when no validator is configured.
#[derive(Debug, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&mut self, _xml: &[u8]) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_validator_accepts_anything() {
        let mut v = NoopValidator;
        assert!(v.validate(b"not even xml").is_ok());
    }

    struct Rejecting;
    impl Validator for Rejecting {
        fn validate(&mut self, _xml: &[u8]) -> Result<(), ValidationError> {
            Err(ValidationError("nope".to_string()))
        }
    }

    #[test]
    fn free_is_a_no_op_by_default() {
        let mut v = Rejecting;
        v.free();
        v.free();
    }
}
