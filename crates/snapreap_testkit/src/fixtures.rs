//! Snapshot fixtures.
//!
//! Provides a builder for well-formed snapshots with nodes of a given age,
//! and a helper that writes snapshots to a temporary file.

use snapreap_core::{
    DataNode, DataTree, SessionTable, Snapshot, SnapshotHeader, Stat, MS_PER_DAY, ROOT_PATH,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fixed reference time for deterministic tests (2023-11-14T22:13:20Z).
pub const FIXED_NOW_MS: i64 = 1_700_000_000_000;

/// Returns a stat whose ctime and mtime both lie `age_days` before `now_ms`.
pub fn aged_stat(now_ms: i64, age_days: i64) -> Stat {
    let ts = now_ms - age_days * MS_PER_DAY;
    Stat {
        ctime: ts,
        mtime: ts,
        ..Stat::default()
    }
}

/// Builds well-formed snapshots node by node.
///
/// Parents must be added before their children. The root is created by
/// [`SnapshotBuilder::new`].
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    now_ms: i64,
    db_id: i64,
    tree: DataTree,
    sessions: SessionTable,
}

impl SnapshotBuilder {
    /// Starts a snapshot containing only a fresh root.
    pub fn new(now_ms: i64) -> Self {
        let mut tree = DataTree::new();
        tree.insert(ROOT_PATH, DataNode::new(None, 0, aged_stat(now_ms, 0)))
            .expect("Failed to insert root");
        Self {
            now_ms,
            db_id: 1,
            tree,
            sessions: SessionTable::new(),
        }
    }

    /// Sets the header's database id.
    #[must_use]
    pub fn db_id(mut self, db_id: i64) -> Self {
        self.db_id = db_id;
        self
    }

    /// Adds a node `age_days` old whose payload is its own path.
    #[must_use]
    pub fn node(self, path: &str, age_days: i64) -> Self {
        self.node_with_data(path, age_days, path.as_bytes())
    }

    /// Adds a node `age_days` old with the given payload.
    #[must_use]
    pub fn node_with_data(self, path: &str, age_days: i64, data: &[u8]) -> Self {
        let mut stat = aged_stat(self.now_ms, age_days);
        stat.data_length = i32::try_from(data.len()).expect("Payload too large");
        self.node_with_stat(path, stat, Some(data.to_vec()))
    }

    /// Adds a node with an explicit stat and payload.
    #[must_use]
    pub fn node_with_stat(mut self, path: &str, stat: Stat, data: Option<Vec<u8>>) -> Self {
        self.tree
            .insert(path, DataNode::new(data, 0, stat))
            .expect("Failed to insert node");
        self
    }

    /// Adds a session.
    #[must_use]
    pub fn session(mut self, session_id: i64, timeout_ms: i32) -> Self {
        self.sessions.insert(session_id, timeout_ms);
        self
    }

    /// Returns the reference time nodes were aged against.
    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    /// Finishes the snapshot.
    pub fn build(self) -> Snapshot {
        Snapshot::new(SnapshotHeader::new(self.db_id), self.tree, self.sessions)
    }

    /// Finishes and serializes the snapshot.
    pub fn to_bytes(self) -> Vec<u8> {
        self.build().encode().expect("Failed to encode snapshot")
    }
}

/// A snapshot file in a temporary directory, removed on drop.
#[derive(Debug)]
pub struct TempSnapshot {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TempSnapshot {
    /// Writes raw bytes to a fresh snapshot file.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("snapshot.0");
        std::fs::write(&path, bytes).expect("Failed to write snapshot");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Serializes a snapshot to a fresh file.
    pub fn write(snapshot: &Snapshot) -> Self {
        Self::from_bytes(&snapshot.encode().expect("Failed to encode snapshot"))
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Ready-made trees.
pub mod scenarios {
    use super::*;

    /// `/jobs` holding `/jobs/old` (40 days) and `/jobs/new` (5 days).
    pub fn jobs(now_ms: i64) -> SnapshotBuilder {
        SnapshotBuilder::new(now_ms)
            .node("/jobs", 2)
            .node("/jobs/new", 5)
            .node("/jobs/old", 40)
    }

    /// An expired `/a` whose children are of mixed age, next to a fresh `/b`.
    pub fn mixed_ages(now_ms: i64) -> SnapshotBuilder {
        SnapshotBuilder::new(now_ms)
            .node("/a", 45)
            .node("/a/fresh", 1)
            .node("/a/stale", 60)
            .node("/a/stale/leaf", 90)
            .node("/b", 3)
            .node("/b/old", 31)
            .node("/b/young", 30)
    }

    /// `width` expired subtrees under `/wide`, each with `depth` nested nodes.
    pub fn wide(now_ms: i64, width: usize, depth: usize) -> SnapshotBuilder {
        let mut builder = SnapshotBuilder::new(now_ms).node("/wide", 0);
        for i in 0..width {
            let mut path = format!("/wide/t{i:04}");
            builder = builder.node(&path, 50);
            for d in 0..depth {
                path = format!("{path}/d{d}");
                builder = builder.node(&path, 50);
            }
        }
        builder
    }
}
