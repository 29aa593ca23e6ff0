//! Property-based test generators using proptest.
//!
//! Generated trees are always well-formed: every node's parent is present
//! and paths are valid.

use proptest::prelude::*;
use snapreap_core::{
    child_path, DataNode, DataTree, SessionTable, Snapshot, SnapshotHeader, Stat, ROOT_PATH,
};

/// Strategy for generating a single path segment.
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9_-]{1,8}").expect("Invalid regex")
}

/// Strategy for generating stat metadata.
pub fn stat_strategy() -> impl Strategy<Value = Stat> {
    (
        (any::<i64>(), any::<i64>(), any::<i32>(), any::<i32>()),
        (any::<i32>(), any::<i64>(), -1i32..4096, any::<i64>()),
    )
        .prop_map(
            |((ctime, mtime, version, cversion), (aversion, ephemeral_owner, data_length, pzxid))| {
                Stat {
                    ctime,
                    mtime,
                    version,
                    cversion,
                    aversion,
                    ephemeral_owner,
                    data_length,
                    pzxid,
                }
            },
        )
}

/// Strategy for generating node payloads, absent or present.
pub fn data_strategy() -> impl Strategy<Value = Option<Vec<u8>>> {
    prop::option::of(prop::collection::vec(any::<u8>(), 0..64))
}

/// Strategy for generating well-formed trees of up to `max_nodes` nodes
/// besides the root.
///
/// Each generated node picks an existing node as its parent, so depth and
/// fan-out vary freely.
pub fn tree_strategy(max_nodes: usize) -> impl Strategy<Value = DataTree> {
    let node = (any::<prop::sample::Index>(), segment_strategy(), stat_strategy(), data_strategy());
    (stat_strategy(), prop::collection::vec(node, 0..=max_nodes)).prop_map(|(root_stat, nodes)| {
        let mut tree = DataTree::new();
        let mut paths = vec![ROOT_PATH.to_string()];
        tree.insert(ROOT_PATH, DataNode::new(None, 0, root_stat))
            .expect("Failed to insert root");

        for (parent, name, stat, data) in nodes {
            let path = child_path(parent.get(paths.as_slice()).as_str(), &name);
            if tree.contains(&path) {
                continue;
            }
            tree.insert(&path, DataNode::new(data, 0, stat))
                .expect("Failed to insert node");
            paths.push(path);
        }
        tree
    })
}

/// Strategy for generating session tables.
pub fn sessions_strategy() -> impl Strategy<Value = SessionTable> {
    prop::collection::vec((any::<i64>(), any::<i32>()), 0..16)
        .prop_map(|pairs| pairs.into_iter().collect::<SessionTable>())
}

/// Strategy for generating complete snapshots.
pub fn snapshot_strategy(max_nodes: usize) -> impl Strategy<Value = Snapshot> {
    (any::<i64>(), tree_strategy(max_nodes), sessions_strategy())
        .prop_map(|(db_id, tree, sessions)| Snapshot::new(SnapshotHeader::new(db_id), tree, sessions))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapreap_core::{parent_path, validate_path};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_trees_are_well_formed(tree in tree_strategy(40)) {
            prop_assert!(tree.root().is_some());
            for (path, _) in tree.walk(ROOT_PATH) {
                prop_assert!(validate_path(&path).is_ok());
                if let Some(parent) = parent_path(&path) {
                    prop_assert!(tree.contains(parent));
                }
            }
            prop_assert_eq!(tree.walk(ROOT_PATH).count(), tree.len());
        }

        #[test]
        fn generated_snapshots_encode(snapshot in snapshot_strategy(20)) {
            prop_assert!(snapshot.encode().is_ok());
        }
    }
}
