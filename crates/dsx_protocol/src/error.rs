//! Error types for the protocol crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a message to CBOR.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode CBOR bytes.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// The decoded message is structurally invalid.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}

/// Canonical status codes returned by a datastore service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Code {
    /// The request was malformed.
    InvalidArgument,
    /// A referenced entity does not exist.
    NotFound,
    /// An insert targeted an entity that already exists.
    AlreadyExists,
    /// The system is not in a state required for the operation.
    FailedPrecondition,
    /// The operation was aborted, typically due to contention.
    Aborted,
    /// The deadline expired before the operation completed.
    DeadlineExceeded,
    /// The service is currently unavailable.
    Unavailable,
    /// The operation is not implemented by this service.
    Unimplemented,
    /// Internal service error.
    Internal,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::Unavailable => "UNAVAILABLE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// An error status returned by a datastore service.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Status {
    /// Status code.
    pub code: Code,
    /// Human readable message.
    pub message: String,
}

impl Status {
    /// Creates a new status.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an `InvalidArgument` status.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// Creates a `NotFound` status.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    /// Creates an `AlreadyExists` status.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    /// Creates an `Internal` status.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// Returns true if a caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            Code::Aborted | Code::Unavailable | Code::DeadlineExceeded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        let status = Status::not_found("no entity");
        assert_eq!(status.to_string(), "NOT_FOUND: no entity");
    }

    #[test]
    fn retryable_codes() {
        assert!(Status::new(Code::Aborted, "contention").is_retryable());
        assert!(Status::new(Code::Unavailable, "down").is_retryable());
        assert!(!Status::invalid_argument("bad").is_retryable());
        assert!(!Status::already_exists("dup").is_retryable());
    }
}
