//! Error types for the codec crate.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding records.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended before a field was complete.
    #[error("truncated stream: needed {needed} more bytes for {field}")]
    Truncated {
        /// Field being decoded when the stream ended.
        field: &'static str,
        /// Number of bytes the field still required.
        needed: usize,
    },

    /// An encoded value is structurally invalid.
    #[error("format error: {message}")]
    Format {
        /// Description of the format issue.
        message: String,
    },

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A length prefix exceeds the configured limit.
    #[error("length {claimed} exceeds limit of {max_allowed} bytes")]
    LengthLimitExceeded {
        /// Length claimed by the prefix.
        claimed: u64,
        /// Maximum accepted length.
        max_allowed: u64,
    },
}

impl CodecError {
    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Returns true if this error means the input ended early.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_field() {
        let err = CodecError::Truncated {
            field: "int64",
            needed: 3,
        };
        assert_eq!(
            err.to_string(),
            "truncated stream: needed 3 more bytes for int64"
        );
        assert!(err.is_truncation());
    }

    #[test]
    fn format_helper() {
        let err = CodecError::format("negative length -7");
        assert!(matches!(err, CodecError::Format { .. }));
        assert!(!err.is_truncation());
    }
}
