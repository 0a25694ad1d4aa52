//! The closed EPP result-code table (RFC 5730 §3).

/// A result code returned in a `<response><result code="...">` element.
///
/// The first digit groups outcomes (`1xxx` success, `2xxx` failure); codes in
/// [`ResultCode::is_terminal`] require the server to close the connection
/// after the response carrying them has been written.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ResultCode {
    CompletedSuccessfully = 1000,
    CompletedSuccessfullyActionPending = 1001,
    CompletedSuccessfullyNoMessages = 1300,
    CompletedSuccessfullyAckToDequeue = 1301,
    CompletedSuccessfullyEndingSession = 1500,
    UnknownCommand = 2000,
    SyntaxError = 2001,
    UseError = 2002,
    MissingParam = 2003,
    ParamRangeError = 2004,
    ParamSyntaxError = 2005,
    UnimplementedVersion = 2100,
    UnimplementedCommand = 2101,
    UnimplementedOption = 2102,
    UnimplementedExtension = 2103,
    BillingFailure = 2104,
    NotRenewable = 2105,
    NotTransferrable = 2106,
    AuthenticationError = 2200,
    AuthorizationError = 2201,
    InvalidAuthInfo = 2202,
    ObjectPendingTransfer = 2300,
    ObjectNotPendingTransfer = 2301,
    ObjectExists = 2302,
    ObjectDoesNotExist = 2303,
    StatusProhibitsOp = 2304,
    AssocProhibitsOp = 2305,
    ParamPolicyError = 2306,
    UnimplementedObjectService = 2307,
    DataMgmtPolicyViolation = 2308,
    CommandFailed = 2400,
    CommandFailedEndingSession = 2500,
    AuthenticationFailedEndingSession = 2501,
    SessionLimitExceededEndingSession = 2502,
}

impl ResultCode {
    /// All codes in the closed enumeration, lowest first.
    pub const ALL: &'static [ResultCode] = &[
        Self::CompletedSuccessfully,
        Self::CompletedSuccessfullyActionPending,
        Self::CompletedSuccessfullyNoMessages,
        Self::CompletedSuccessfullyAckToDequeue,
        Self::CompletedSuccessfullyEndingSession,
        Self::UnknownCommand,
        Self::SyntaxError,
        Self::UseError,
        Self::MissingParam,
        Self::ParamRangeError,
        Self::ParamSyntaxError,
        Self::UnimplementedVersion,
        Self::UnimplementedCommand,
        Self::UnimplementedOption,
        Self::UnimplementedExtension,
        Self::BillingFailure,
        Self::NotRenewable,
        Self::NotTransferrable,
        Self::AuthenticationError,
        Self::AuthorizationError,
        Self::InvalidAuthInfo,
        Self::ObjectPendingTransfer,
        Self::ObjectNotPendingTransfer,
        Self::ObjectExists,
        Self::ObjectDoesNotExist,
        Self::StatusProhibitsOp,
        Self::AssocProhibitsOp,
        Self::ParamPolicyError,
        Self::UnimplementedObjectService,
        Self::DataMgmtPolicyViolation,
        Self::CommandFailed,
        Self::CommandFailedEndingSession,
        Self::AuthenticationFailedEndingSession,
        Self::SessionLimitExceededEndingSession,
    ];

    /// The wire value of this code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Looks up a code by its wire value.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// The fixed, canonical English message for this code.
    pub fn message(self) -> &'static str {
        use ResultCode::*;
        match self {
            CompletedSuccessfully => "Command completed successfully",
            CompletedSuccessfullyActionPending => {
                "Command completed successfully; action pending"
            }
            CompletedSuccessfullyNoMessages => "Command completed successfully; no messages",
            CompletedSuccessfullyAckToDequeue => {
                "Command completed successfully; ack to dequeue"
            }
            CompletedSuccessfullyEndingSession => {
                "Command completed successfully; ending session"
            }
            UnknownCommand => "Unknown command",
            SyntaxError => "Command syntax error",
            UseError => "Command use error",
            MissingParam => "Required parameter missing",
            ParamRangeError => "Parameter value range error",
            ParamSyntaxError => "Parameter value syntax error",
            UnimplementedVersion => "Unimplemented protocol version",
            UnimplementedCommand => "Unimplemented command",
            UnimplementedOption => "Unimplemented option",
            UnimplementedExtension => "Unimplemented extension",
            BillingFailure => "Billing failure",
            NotRenewable => "Object is not eligible for renewal",
            NotTransferrable => "Object is not eligible for transfer",
            AuthenticationError => "Authentication error",
            AuthorizationError => "Authorization error",
            InvalidAuthInfo => "Invalid authorization information",
            ObjectPendingTransfer => "Object pending transfer",
            ObjectNotPendingTransfer => "Object not pending transfer",
            ObjectExists => "Object exists",
            ObjectDoesNotExist => "Object does not exist",
            StatusProhibitsOp => "Object status prohibits operation",
            AssocProhibitsOp => "Object association prohibits operation",
            ParamPolicyError => "Parameter value policy error",
            UnimplementedObjectService => "Unimplemented object service",
            DataMgmtPolicyViolation => "Data management policy violation",
            CommandFailed => "Command failed",
            CommandFailedEndingSession => "Command failed; server closing connection",
            AuthenticationFailedEndingSession => "Authentication error; server closing connection",
            SessionLimitExceededEndingSession => {
                "Session limit exceeded; server closing connection"
            }
        }
    }

    /// Whether the first digit is `1`, i.e. the command succeeded.
    pub fn is_success(self) -> bool {
        self.code() < 2000
    }

    /// Whether a response carrying this code requires the server to close
    /// the connection immediately after sending it.
    pub fn is_terminal(self) -> bool {
        use ResultCode::*;
        matches!(
            self,
            CompletedSuccessfullyEndingSession
                | CommandFailedEndingSession
                | AuthenticationFailedEndingSession
                | SessionLimitExceededEndingSession
        )
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set_matches_spec() {
        for code in ResultCode::ALL {
            let expect_terminal = matches!(code.code(), 1500 | 2500 | 2501 | 2502);
            assert_eq!(
                code.is_terminal(),
                expect_terminal,
                "mismatch for {code:?}"
            );
        }
    }

    #[test]
    fn round_trips_through_wire_value() {
        for code in ResultCode::ALL {
            assert_eq!(ResultCode::from_code(code.code()), Some(*code));
        }
    }

    #[test]
    fn unknown_wire_value_is_none() {
        assert_eq!(ResultCode::from_code(9999), None);
    }

    #[test]
    fn success_is_first_digit_one() {
        assert!(ResultCode::CompletedSuccessfully.is_success());
        assert!(!ResultCode::UnknownCommand.is_success());
    }
}
