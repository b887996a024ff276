//! Shared error type across calltally crates.

use thiserror::Error;

/// Stable error codes (used in logs and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Input could not be decomposed as a URI.
    InvalidUri,
    /// The metrics sink refused a registration or update.
    SinkRejected,
    /// Configuration is malformed or out of range.
    BadConfig,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and as failure kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidUri => "INVALID_URI",
            ErrorCode::SinkRejected => "SINK_REJECTED",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, CallTallyError>;

/// Unified error type used by core and instrument.
#[derive(Debug, Error)]
pub enum CallTallyError {
    #[error("invalid uri: {0}")]
    InvalidUri(String),
    #[error("sink rejected {metric}: {reason}")]
    SinkRejected { metric: String, reason: String },
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl CallTallyError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            CallTallyError::InvalidUri(_) => ErrorCode::InvalidUri,
            CallTallyError::SinkRejected { .. } => ErrorCode::SinkRejected,
            CallTallyError::BadConfig(_) => ErrorCode::BadConfig,
            CallTallyError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            CallTallyError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub(crate) fn invalid_uri(input: &str, why: &str) -> Self {
        CallTallyError::InvalidUri(format!("{why} in {input:?}"))
    }
}
