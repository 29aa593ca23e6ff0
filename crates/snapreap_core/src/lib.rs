//! # Snapreap Core
//!
//! Snapshot model for snapreap.
//!
//! This crate provides:
//! - [`Snapshot`] loading with checksum verification, and the matching writer
//! - [`DataTree`], the path-keyed namespace reconstructed from a snapshot
//! - [`SessionTable`], loaded verbatim
//! - [`ExpiryPolicy`], the age classifier used to pick deletion candidates
//!
//! ## Key Invariants
//!
//! - A snapshot is fully materialized and verified before it is returned
//! - Parents are always present before their children are linked
//! - Ages are whole days rounded down, and expiry is strictly greater-than

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod expiry;
mod node;
mod session;
mod snapshot;
mod tree;

pub use error::{CoreError, CoreResult};
pub use expiry::{age_days, is_expired, AgeBasis, ExpiryPolicy, MS_PER_DAY};
pub use node::{DataNode, Stat};
pub use session::SessionTable;
pub use snapshot::{LoadOptions, Snapshot, SnapshotHeader, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use tree::{child_path, last_segment, parent_path, validate_path, DataTree, Walk, ROOT_PATH};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
