//! CLI usage errors.

use snapreap_core::CoreError;
use thiserror::Error;

/// Errors raised by the command layer itself.
#[derive(Error, Debug)]
pub enum CliError {
    /// No `--snapshot` was given.
    #[error("snapshot path required (use --snapshot)")]
    SnapshotRequired,

    /// A live run was requested without `--server`.
    #[error("server address required unless --dry-run is set (use --server)")]
    ServerRequired,

    /// The `--format` value is not recognized.
    #[error("unknown output format {0:?}, expected text or json")]
    UnknownFormat(String),

    /// The run was interrupted before every candidate was processed.
    #[error("interrupted: {deleted} nodes processed before cancellation")]
    Interrupted {
        /// Nodes counted before the run stopped.
        deleted: u64,
    },

    /// The snapshot could not be loaded.
    #[error("failed to load snapshot {path}: {source}")]
    Load {
        /// Snapshot path as given.
        path: String,
        /// Underlying failure.
        #[source]
        source: CoreError,
    },
}
