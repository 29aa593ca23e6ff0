//! Error types for snapreap core.

use snapreap_codec::CodecError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while loading or querying a snapshot.
///
/// Every variant is fatal for a run: a snapshot that fails to load is
/// never partially trusted.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The snapshot stream could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The snapshot ended in the middle of a record.
    #[error("truncated snapshot: {message}")]
    Truncated {
        /// Description of what was being read.
        message: String,
    },

    /// The snapshot is structurally invalid.
    #[error("invalid snapshot format: {message}")]
    Format {
        /// Description of the format issue.
        message: String,
    },

    /// The header names a format this build does not read.
    #[error("unsupported snapshot format: {message}")]
    UnsupportedFormat {
        /// Description of the header mismatch.
        message: String,
    },

    /// The trailer checksum does not match the content.
    #[error("corrupt snapshot: checksum mismatch, stored {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the trailer.
        expected: u32,
        /// Checksum computed over the content.
        actual: u32,
    },

    /// A path is not present in the tree.
    #[error("node not found: {path}")]
    NodeNotFound {
        /// The missing path.
        path: String,
    },
}

impl CoreError {
    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: message.into(),
        }
    }

    /// Creates a node not found error.
    pub fn node_not_found(path: impl Into<String>) -> Self {
        Self::NodeNotFound { path: path.into() }
    }
}

impl From<CodecError> for CoreError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => Self::Io(e),
            CodecError::Truncated { field, needed } => Self::Truncated {
                message: format!("{needed} bytes missing while reading {field}"),
            },
            CodecError::Format { message } => Self::Format { message },
            CodecError::InvalidUtf8 => Self::format("string field is not valid UTF-8"),
            e @ CodecError::LengthLimitExceeded { .. } => Self::format(e.to_string()),
        }
    }
}
