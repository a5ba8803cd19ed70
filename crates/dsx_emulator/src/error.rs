//! Error types for the emulator.

use dsx_protocol::{Code, Status};
use thiserror::Error;

/// Result type for emulator operations.
pub type EmulatorResult<T> = Result<T, EmulatorError>;

/// Errors that can occur in the emulator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmulatorError {
    /// Malformed request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Update of an entity that does not exist.
    #[error("no entity to update: {0}")]
    NotFound(String),

    /// Insert of an entity that already exists.
    #[error("entity already exists: {0}")]
    AlreadyExists(String),

    /// Request for a project this emulator does not serve.
    #[error("unknown project: {0}")]
    UnknownProject(String),

    /// Internal emulator error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EmulatorError {
    /// Returns true if the caller sent a bad request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EmulatorError::Internal(_))
    }

    /// Status code reported to clients.
    pub fn code(&self) -> Code {
        match self {
            EmulatorError::InvalidArgument(_) => Code::InvalidArgument,
            EmulatorError::NotFound(_) => Code::NotFound,
            EmulatorError::AlreadyExists(_) => Code::AlreadyExists,
            EmulatorError::UnknownProject(_) => Code::FailedPrecondition,
            EmulatorError::Internal(_) => Code::Internal,
        }
    }
}

impl From<EmulatorError> for Status {
    fn from(err: EmulatorError) -> Self {
        Status::new(err.code(), err.to_string())
    }
}
