//! In-memory live namespace.
//!
//! Applies the same delete contract as the real service: version checks,
//! missing nodes, and refusal to delete nodes that still have children.
//! Used to exercise the engine against a live tree that has drifted from
//! its snapshot.

use crate::error::{ServiceError, ServiceResult};
use crate::service::NamespaceService;
use parking_lot::Mutex;
use snapreap_core::{parent_path, DataTree, ROOT_PATH};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Version that matches any live version.
pub const ANY_VERSION: i32 = -1;

#[derive(Debug, Clone, Copy)]
struct LiveNode {
    version: i32,
    children: usize,
}

/// A live namespace held in memory.
#[derive(Debug)]
pub struct MemoryService {
    nodes: Mutex<HashMap<String, LiveNode>>,
    calls: Mutex<Vec<String>>,
    faults: Mutex<HashMap<String, VecDeque<ServiceError>>>,
    connected: AtomicBool,
    close_count: AtomicUsize,
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryService {
    /// Creates a live namespace holding only the root.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_PATH.to_string(),
            LiveNode {
                version: 0,
                children: 0,
            },
        );
        Self {
            nodes: Mutex::new(nodes),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            close_count: AtomicUsize::new(0),
        }
    }

    /// Creates a live namespace identical to a snapshot tree.
    pub fn from_tree(tree: &DataTree) -> Self {
        let nodes = tree
            .walk(ROOT_PATH)
            .map(|(path, node)| {
                (
                    path,
                    LiveNode {
                        version: node.stat.version,
                        children: node.child_count(),
                    },
                )
            })
            .collect();
        Self {
            nodes: Mutex::new(nodes),
            ..Self::new()
        }
    }

    /// Creates a node, as another client would.
    ///
    /// # Errors
    ///
    /// Returns `NoNode` if the parent is missing.
    pub fn create(&self, path: &str, version: i32) -> ServiceResult<()> {
        let mut nodes = self.nodes.lock();
        if let Some(parent) = parent_path(path) {
            let parent_node = nodes.get_mut(parent).ok_or_else(|| ServiceError::NoNode {
                path: parent.to_string(),
            })?;
            parent_node.children += 1;
        }
        nodes.insert(
            path.to_string(),
            LiveNode {
                version,
                children: 0,
            },
        );
        Ok(())
    }

    /// Bumps a node's version, as a concurrent update would.
    pub fn touch(&self, path: &str) {
        if let Some(node) = self.nodes.lock().get_mut(path) {
            node.version += 1;
        }
    }

    /// Removes a node and its subtree behind the engine's back.
    pub fn remove_subtree(&self, path: &str) {
        let mut nodes = self.nodes.lock();
        let prefix = format!("{path}/");
        nodes.retain(|p, _| p != path && !p.starts_with(&prefix));
        if let Some(parent) = parent_path(path).and_then(|p| nodes.get_mut(p)) {
            parent.children = parent.children.saturating_sub(1);
        }
    }

    /// Queues an error to be returned by the next delete of `path`.
    pub fn inject_failure(&self, path: &str, error: ServiceError) {
        self.faults
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(error);
    }

    /// Returns true if `path` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.nodes.lock().contains_key(path)
    }

    /// Returns the live version of `path`.
    pub fn version(&self, path: &str) -> Option<i32> {
        self.nodes.lock().get(path).map(|n| n.version)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Returns true if even the root is gone.
    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }

    /// Every path passed to `delete`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of times `close` was called.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl NamespaceService for MemoryService {
    fn delete(&self, path: &str, expected_version: i32) -> ServiceResult<()> {
        self.calls.lock().push(path.to_string());

        if !self.is_connected() {
            return Err(ServiceError::Closed);
        }
        if let Some(error) = self
            .faults
            .lock()
            .get_mut(path)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }

        let mut nodes = self.nodes.lock();
        let node = *nodes.get(path).ok_or_else(|| ServiceError::NoNode {
            path: path.to_string(),
        })?;
        if expected_version != ANY_VERSION && expected_version != node.version {
            return Err(ServiceError::BadVersion {
                path: path.to_string(),
                expected: expected_version,
            });
        }
        if node.children > 0 {
            return Err(ServiceError::NotEmpty {
                path: path.to_string(),
            });
        }

        nodes.remove(path);
        if let Some(parent) = parent_path(path).and_then(|p| nodes.get_mut(p)) {
            parent.children = parent.children.saturating_sub(1);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> ServiceResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
