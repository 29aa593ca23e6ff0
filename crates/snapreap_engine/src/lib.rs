//! # Snapreap Engine
//!
//! Deletes expired subtrees of a snapshot from the live namespace service.
//!
//! This crate provides:
//! - [`ReapEngine`], the scan, delete and report orchestrator
//! - [`NamespaceService`], the live-service seam, with [`ZkClient`] for the
//!   real wire protocol and [`MemoryService`] as an in-memory stand-in
//! - [`DeletionStats`], atomic run counters
//! - [`CancelToken`] and [`ReapObserver`] for control and progress
//!
//! ## Example
//!
//! ```rust,ignore
//! use snapreap_core::{AgeBasis, ExpiryPolicy, Snapshot};
//! use snapreap_engine::{NoopObserver, ReapConfig, ReapEngine};
//!
//! let snapshot = Snapshot::open("snapshot.100")?;
//! let config = ReapConfig::new("/jobs", ExpiryPolicy::new(AgeBasis::Mtime, 30))
//!     .with_dry_run(true);
//! let report = ReapEngine::new(&snapshot.tree, config).run(None, &NoopObserver)?;
//! println!("{} nodes, {} bytes", report.deleted_count(), report.deleted_bytes());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod client;
mod config;
mod engine;
mod error;
mod memory;
pub mod proto;
mod service;
mod stats;

pub use cancel::CancelToken;
pub use client::{parse_servers, ZkClient, DEFAULT_PORT};
pub use config::{current_time_ms, ReapConfig, RetryConfig, ServiceConfig};
pub use engine::{Candidate, NodeOutcome, NoopObserver, ReapEngine, ReapObserver, ReapReport};
pub use error::{EngineError, EngineResult, ServiceError, ServiceResult};
pub use memory::{MemoryService, ANY_VERSION};
pub use service::{NamespaceService, ServiceGuard};
pub use stats::{DeletionStats, StatsSnapshot};
