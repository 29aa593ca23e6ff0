//! The in-memory namespace tree reconstructed from a snapshot.

use crate::error::{CoreError, CoreResult};
use crate::node::DataNode;
use std::collections::HashMap;

/// Path of the namespace root.
pub const ROOT_PATH: &str = "/";

/// Path-keyed namespace tree.
///
/// # Invariants
///
/// - A node is only inserted when its parent is already present
/// - Every non-root node is listed in exactly one parent's children
/// - Once loading completes the root `/` exists
#[derive(Debug, Clone, Default)]
pub struct DataTree {
    nodes: HashMap<String, DataNode>,
}

impl DataTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node and links it under its parent.
    ///
    /// # Errors
    ///
    /// Returns a format error if the path is malformed, already present,
    /// or its parent has not been inserted yet.
    pub fn insert(&mut self, path: &str, node: DataNode) -> CoreResult<()> {
        validate_path(path)?;
        if self.nodes.contains_key(path) {
            return Err(CoreError::format(format!("duplicate node {path}")));
        }

        if let Some(parent) = parent_path(path) {
            let name = last_segment(path);
            let parent_node = self.nodes.get_mut(parent).ok_or_else(|| {
                CoreError::format(format!("out-of-order node {path}: parent {parent} not loaded"))
            })?;
            parent_node.add_child(name);
        }

        self.nodes.insert(path.to_string(), node);
        Ok(())
    }

    /// Returns the node at `path`.
    pub fn get(&self, path: &str) -> Option<&DataNode> {
        self.nodes.get(path)
    }

    /// Returns the node at `path` or a not-found error.
    pub fn require(&self, path: &str) -> CoreResult<&DataNode> {
        self.get(path).ok_or_else(|| CoreError::node_not_found(path))
    }

    /// Returns true if `path` is present.
    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Returns the root node, if loaded.
    pub fn root(&self) -> Option<&DataNode> {
        self.get(ROOT_PATH)
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node has been inserted.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Full paths of the immediate children of `path`, in sorted order.
    pub fn child_paths(&self, path: &str) -> Vec<String> {
        self.get(path)
            .map(|node| node.children().map(|name| child_path(path, name)).collect())
            .unwrap_or_default()
    }

    /// Sum of the approximate data length of every node.
    pub fn total_data_bytes(&self) -> u64 {
        self.nodes.values().map(|n| n.stat.approximate_size()).sum()
    }

    /// Iterates the subtree at `from` in pre-order, parents before children.
    pub fn walk(&self, from: &str) -> Walk<'_> {
        let stack = if self.contains(from) {
            vec![from.to_string()]
        } else {
            Vec::new()
        };
        Walk { tree: self, stack }
    }
}

/// Pre-order iterator over a subtree, see [`DataTree::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    tree: &'a DataTree,
    stack: Vec<String>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (String, &'a DataNode);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = self.stack.pop()?;
            let Some(node) = self.tree.get(&path) else {
                continue;
            };
            // Reverse so that the smallest child is popped first.
            for name in node.children().rev() {
                self.stack.push(child_path(&path, name));
            }
            return Some((path, node));
        }
    }
}

/// Checks that `path` is absolute, has no empty segments, and has no
/// trailing slash unless it is the root.
///
/// # Errors
///
/// Returns a format error describing the violation.
pub fn validate_path(path: &str) -> CoreResult<()> {
    if !path.starts_with('/') {
        return Err(CoreError::format(format!("path {path:?} is not absolute")));
    }
    if path == ROOT_PATH {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(CoreError::format(format!("path {path:?} has a trailing slash")));
    }
    if path.contains("//") {
        return Err(CoreError::format(format!("path {path:?} has an empty segment")));
    }
    Ok(())
}

/// Returns the parent of `path`, or `None` for the root.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == ROOT_PATH {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT_PATH),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Returns the final segment of `path`.
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Joins a parent path and a child name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Stat;

    fn node() -> DataNode {
        DataNode::new(None, -1, Stat::default())
    }

    fn sample() -> DataTree {
        let mut tree = DataTree::new();
        for path in ["/", "/jobs", "/jobs/old", "/jobs/new", "/jobs/old/x", "/cfg"] {
            tree.insert(path, node()).unwrap();
        }
        tree
    }

    #[test]
    fn parent_paths() {
        assert_eq!(parent_path("/"), None);
        assert_eq!(parent_path("/a"), Some("/"));
        assert_eq!(parent_path("/a/b/c"), Some("/a/b"));
    }

    #[test]
    fn segments_and_joins() {
        assert_eq!(last_segment("/a/b"), "b");
        assert_eq!(last_segment("/a"), "a");
        assert_eq!(child_path("/", "a"), "/a");
        assert_eq!(child_path("/a", "b"), "/a/b");
    }

    #[test]
    fn path_validation() {
        assert!(validate_path("/").is_ok());
        assert!(validate_path("/a/b").is_ok());
        assert!(validate_path("a").is_err());
        assert!(validate_path("/a/").is_err());
        assert!(validate_path("/a//b").is_err());
        assert!(validate_path("").is_err());
    }

    #[test]
    fn insert_links_children() {
        let tree = sample();
        assert_eq!(tree.len(), 6);
        assert_eq!(
            tree.child_paths("/jobs"),
            vec!["/jobs/new".to_string(), "/jobs/old".to_string()]
        );
        assert_eq!(tree.child_paths("/"), vec!["/cfg", "/jobs"]);
        assert!(tree.child_paths("/missing").is_empty());
    }

    #[test]
    fn out_of_order_insert_fails() {
        let mut tree = DataTree::new();
        tree.insert("/", node()).unwrap();
        let err = tree.insert("/a/b", node()).unwrap_err();
        assert!(matches!(err, CoreError::Format { .. }));
        assert!(err.to_string().contains("out-of-order"));
        assert!(!tree.contains("/a/b"));
    }

    #[test]
    fn child_before_root_fails() {
        let mut tree = DataTree::new();
        assert!(matches!(
            tree.insert("/a", node()),
            Err(CoreError::Format { .. })
        ));
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut tree = sample();
        assert!(matches!(
            tree.insert("/jobs", node()),
            Err(CoreError::Format { .. })
        ));
    }

    #[test]
    fn walk_is_preorder_sorted() {
        let tree = sample();
        let paths: Vec<String> = tree.walk("/").map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec!["/", "/cfg", "/jobs", "/jobs/new", "/jobs/old", "/jobs/old/x"]
        );
        let sub: Vec<String> = tree.walk("/jobs/old").map(|(p, _)| p).collect();
        assert_eq!(sub, vec!["/jobs/old", "/jobs/old/x"]);
        assert_eq!(tree.walk("/nope").count(), 0);
    }

    #[test]
    fn require_reports_missing_path() {
        let tree = sample();
        assert!(tree.require("/jobs").is_ok());
        assert!(matches!(
            tree.require("/gone"),
            Err(CoreError::NodeNotFound { .. })
        ));
    }
}
