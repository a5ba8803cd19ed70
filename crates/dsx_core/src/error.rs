//! Error types for DSX core.

use crate::key::Key;
use dsx_protocol::{CodecError, CommitResponse, Status};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for RPC calls.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors raised by the call path between the client and the datastore.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The service rejected the call.
    #[error("rpc failed: {0}")]
    Status(#[from] Status),

    /// Request or response could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The scope's deadline passed before the call was sent.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The scope was cancelled before the call was sent.
    #[error("call cancelled")]
    Cancelled,

    /// Not connected.
    #[error("not connected to datastore")]
    NotConnected,

    /// The transport answered with the wrong response type.
    #[error("unexpected response to {method}")]
    UnexpectedResponse {
        /// Method that was called.
        method: &'static str,
    },
}

impl RpcError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport { retryable, .. } => *retryable,
            RpcError::Status(status) => status.is_retryable(),
            RpcError::DeadlineExceeded => true,
            _ => false,
        }
    }
}

/// Errors returned by DSX core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The native client does not expose the handles this library needs.
    ///
    /// Raised at construction and by [`crate::self_check`]; it means the
    /// client and this library were built against incompatible versions.
    #[error("client is not compatible with this extension: {reason}; check for a matching dsx_core release")]
    AdapterIncompatible {
        /// What did not match.
        reason: String,
    },

    /// Locking was requested without a recorder in the scope.
    #[error("missing recorder in scope, read and mutate with the same recorder scope (with_recorder)")]
    MissingRecorder,

    /// A key passed for locking was never read through the recording path.
    #[error("missing entity {key} in recorder")]
    MissingEntity {
        /// The key that was never observed.
        key: Key,
    },

    /// At least one mutation's base version no longer matched.
    ///
    /// Carries the complete commit response so callers can inspect which
    /// mutations reported `conflict_detected`.
    #[error("conflict")]
    Conflict {
        /// Full per-mutation results of the commit.
        response: Box<CommitResponse>,
    },

    /// Transport or service error from the underlying call.
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// A key is malformed or unusable for the requested operation.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },

    /// Client configuration is incomplete.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl CoreError {
    /// Creates an adapter incompatibility error.
    pub fn adapter_incompatible(reason: impl Into<String>) -> Self {
        Self::AdapterIncompatible {
            reason: reason.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this is a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict { .. })
    }

    /// Returns the commit response carried by a conflict.
    pub fn conflict_response(&self) -> Option<&CommitResponse> {
        match self {
            CoreError::Conflict { response } => Some(response.as_ref()),
            _ => None,
        }
    }

    /// Returns the service status if the error came from the datastore.
    pub fn status(&self) -> Option<&Status> {
        match self {
            CoreError::Rpc(RpcError::Status(status)) => Some(status),
            _ => None,
        }
    }
}
