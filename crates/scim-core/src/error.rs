//! Error types for SCIM operations.
//!
//! This module provides the error taxonomy shared by the SCIM data model and
//! the directory backend, including LDAP result-code classification and HTTP
//! status code mapping for the front end.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// An LDAP result code as carried in directory operation responses.
///
/// Only the codes the translation core needs to reason about are named;
/// any other code can still be represented and propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResultCode(pub u32);

impl ResultCode {
    /// The operation completed successfully.
    pub const SUCCESS: Self = Self(0);
    /// The server encountered an internal sequencing problem.
    pub const OPERATIONS_ERROR: Self = Self(1);
    /// The request violated the protocol.
    pub const PROTOCOL_ERROR: Self = Self(2);
    /// More entries matched than the requested size limit allows.
    pub const SIZE_LIMIT_EXCEEDED: Self = Self(4);
    /// The target entry does not exist.
    pub const NO_SUCH_OBJECT: Self = Self(32);
    /// The server refused the operation for policy reasons.
    pub const UNWILLING_TO_PERFORM: Self = Self(53);
    /// The server is too busy to service the operation.
    pub const BUSY: Self = Self(51);
    /// The server is shutting down or otherwise unavailable.
    pub const UNAVAILABLE: Self = Self(52);
    /// An entry with the target DN already exists.
    pub const ENTRY_ALREADY_EXISTS: Self = Self(68);
    /// A failure not covered by a more specific code.
    pub const OTHER: Self = Self(80);
    /// Client-side: the connection to the server was lost.
    pub const SERVER_DOWN: Self = Self(81);
    /// Client-side: a local processing error occurred.
    pub const LOCAL_ERROR: Self = Self(82);
    /// Client-side: the request could not be encoded.
    pub const ENCODING_ERROR: Self = Self(83);
    /// Client-side: the response could not be decoded.
    pub const DECODING_ERROR: Self = Self(84);
    /// Client-side: memory was exhausted while processing.
    pub const NO_MEMORY: Self = Self(90);
    /// Client-side: the connection could not be established.
    pub const CONNECT_ERROR: Self = Self(91);

    /// Returns the numeric value of the result code.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true if a failed operation with this code means the
    /// connection it ran on can no longer be trusted.
    ///
    /// A defunct connection is discarded rather than returned to the idle
    /// pool; the pool replenishes on the next borrow.
    #[must_use]
    pub const fn is_defunct(self) -> bool {
        matches!(
            self,
            Self::OPERATIONS_ERROR
                | Self::PROTOCOL_ERROR
                | Self::BUSY
                | Self::UNAVAILABLE
                | Self::UNWILLING_TO_PERFORM
                | Self::OTHER
                | Self::SERVER_DOWN
                | Self::LOCAL_ERROR
                | Self::ENCODING_ERROR
                | Self::DECODING_ERROR
                | Self::NO_MEMORY
                | Self::CONNECT_ERROR
        )
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ResultCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Main error type for SCIM translation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No resource descriptor is registered under the requested name
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// No mapper for the resource kind supports entry creation
    #[error("No resource mapper supports creation of {0} resources")]
    NoCreator(String),

    /// The resource is missing attributes required to build an entry
    #[error("Incomplete resource: {0}")]
    IncompleteResource(String),

    /// An attribute value does not conform to its declared type
    #[error("Malformed value: {0}")]
    MalformedValue(String),

    /// A single-entry search matched more than one entry
    #[error("Too many results: {0}")]
    TooManyResults(String),

    /// A directory operation failed with the given result code
    #[error("Directory operation failed (result code {code}): {message}")]
    Backend {
        /// Result code returned by the directory or the client library
        code: ResultCode,
        /// Diagnostic message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Specialized result type for SCIM translation operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Convenience constructor for a backend failure.
    #[must_use]
    pub fn backend(code: impl Into<ResultCode>, message: impl Into<String>) -> Self {
        Self::Backend {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownResource(_) => "UNKNOWN_RESOURCE",
            Self::NoCreator(_) => "NO_CREATOR",
            Self::IncompleteResource(_) => "INCOMPLETE_RESOURCE",
            Self::MalformedValue(_) => "MALFORMED_VALUE",
            Self::TooManyResults(_) => "TOO_MANY_RESULTS",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::Timeout(_) => "TIMEOUT",
        }
    }

    /// Returns the LDAP result code for backend failures.
    #[must_use]
    pub const fn ldap_result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Backend { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns the HTTP status the front end should answer with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::UnknownResource(_) => 404,
            Self::IncompleteResource(_) | Self::MalformedValue(_) => 400,
            Self::Backend { code, .. } => {
                if code.is_defunct() {
                    503
                } else {
                    500
                }
            }
            Self::NoCreator(_) | Self::TooManyResults(_) | Self::ConfigError(_) => 500,
            Self::Timeout(_) => 504,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. } | Self::ConfigError(_) | Self::Timeout(_)
        )
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        ErrorResponse {
            status: self.http_status(),
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        }
    }
}

/// Structured error response for serialization by the HTTP layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status: u16,
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}
