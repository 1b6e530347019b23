//! Error types for the Anedya client

use std::fmt;

use hyper::StatusCode;
use thiserror::Error;

/// Closed classification of every failure an operation can report.
///
/// Kinds are stable identifiers meant for branching in caller code; the
/// accompanying message is for humans and may change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required field was missing or empty
    InputRequired,
    /// A field was present but outside its allowed range or set
    ValidationFailed,
    /// The request could not be serialized
    RequestEncodeFailed,
    /// The outbound HTTP request could not be constructed
    RequestBuildFailed,
    /// The transport failed, timed out, or the call was cancelled while waiting
    TransportFailed,
    /// The response body could not be read in full
    ResponseReadFailed,
    /// The response body was not a valid envelope or payload
    ResponseDecodeFailed,
    /// Authentication or authorization was rejected
    Unauthorized,
    /// The addressed resource does not exist
    NotFound,
    /// The resource already exists or violates a uniqueness rule
    Conflict,
    /// A platform or request limit was exceeded
    ResourceLimitExceeded,
    /// The server reported a reason code this client does not recognize
    Unknown,
}

impl ErrorKind {
    /// Short lowercase label, used in `Display`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputRequired => "input required",
            Self::ValidationFailed => "validation failed",
            Self::RequestEncodeFailed => "request encode failed",
            Self::RequestBuildFailed => "request build failed",
            Self::TransportFailed => "request failed",
            Self::ResponseReadFailed => "response read failed",
            Self::ResponseDecodeFailed => "response decode failed",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::ResourceLimitExceeded => "resource limit exceeded",
            Self::Unknown => "unknown error",
        }
    }

    /// Whether this kind is raised locally before any network I/O.
    pub fn is_client_side(self) -> bool {
        matches!(
            self,
            Self::InputRequired
                | Self::ValidationFailed
                | Self::RequestEncodeFailed
                | Self::RequestBuildFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every client operation.
///
/// Carries exactly one [`ErrorKind`] plus a message. Errors produced from a
/// server envelope also keep the raw reason code and HTTP status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("anedya api error: {message}: {kind}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    reason_code: Option<String>,
    status: Option<u16>,
}

impl Error {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            reason_code: None,
            status: None,
        }
    }

    /// Shorthand for an [`ErrorKind::InputRequired`] error.
    pub fn input_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputRequired, message)
    }

    /// Shorthand for an [`ErrorKind::ValidationFailed`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub(crate) fn with_reason_code(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        if !code.is_empty() {
            self.reason_code = Some(code);
        }
        self
    }

    pub(crate) fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status.as_u16());
        self
    }

    /// The classification of this error
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error is of the given kind
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Human-readable description
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Reason code sent by the server, if any
    pub fn reason_code(&self) -> Option<&str> {
        self.reason_code.as_deref()
    }

    /// HTTP status of the response that produced this error, if one arrived
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;
