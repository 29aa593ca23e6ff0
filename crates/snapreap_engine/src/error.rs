//! Error types for the deletion engine and the live service.

use snapreap_core::CoreError;
use thiserror::Error;

/// Result type for live service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by a live namespace service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The node does not exist on the live service.
    #[error("no such node: {path}")]
    NoNode {
        /// Path that was not found.
        path: String,
    },

    /// The live version differs from the expected one.
    #[error("version mismatch on {path}: expected {expected}")]
    BadVersion {
        /// Path whose version differed.
        path: String,
        /// Version supplied with the request.
        expected: i32,
    },

    /// The node gained children on the live service.
    #[error("node not empty: {path}")]
    NotEmpty {
        /// Path that still has children.
        path: String,
    },

    /// The service could not be reached or refused the session.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A request failed in transit.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A request did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// The server expired the session.
    #[error("session expired")]
    SessionExpired,

    /// The server sent something the client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected the request with an unmapped error code.
    #[error("server error {code} on {path}")]
    Server {
        /// Raw error code.
        code: i32,
        /// Path of the request.
        path: String,
    },

    /// The handle has been closed.
    #[error("service handle is closed")]
    Closed,
}

impl ServiceError {
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
    ///
    /// Missing nodes and version mismatches are terminal for a node.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Transport { retryable, .. } => *retryable,
            ServiceError::Timeout => true,
            _ => false,
        }
    }
}

/// Errors that abort a deletion run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The scan root is not in the snapshot.
    #[error("root {path} not found in snapshot")]
    RootNotFound {
        /// The requested root.
        path: String,
    },

    /// A live run was requested without a service handle.
    #[error("a live service is required unless running dry")]
    ServiceRequired,

    /// The live service failed before the run could start.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// The snapshot could not be used.
    #[error("snapshot error: {0}")]
    Core(#[from] CoreError),
}
