//! # Snapreap Testkit
//!
//! Test utilities for snapreap.
//!
//! This crate provides:
//! - Snapshot fixtures built node by node, with ages relative to a fixed "now"
//! - Temporary snapshot files
//! - Unchecked raw streams and corruption helpers for malformed input
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use snapreap_testkit::prelude::*;
//!
//! let snapshot = SnapshotBuilder::new(FIXED_NOW_MS)
//!     .node("/jobs", 1)
//!     .node("/jobs/old", 40)
//!     .build();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod corrupt;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::corrupt::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use corrupt::*;
pub use fixtures::*;
pub use generators::*;
