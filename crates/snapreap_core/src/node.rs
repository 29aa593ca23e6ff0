//! Node records and their stat metadata.

use std::collections::BTreeSet;

/// Per-node metadata as stored in the snapshot.
///
/// Only `ctime`, `mtime`, `version` and `data_length` are interpreted here.
/// The remaining counters are carried through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    /// Creation time, milliseconds since the epoch.
    pub ctime: i64,
    /// Last-modified time, milliseconds since the epoch.
    pub mtime: i64,
    /// Data version, the optimistic concurrency token for deletes.
    pub version: i32,
    /// Child version.
    pub cversion: i32,
    /// ACL version.
    pub aversion: i32,
    /// Owning session for ephemeral nodes, zero otherwise.
    pub ephemeral_owner: i64,
    /// Approximate payload length in bytes.
    pub data_length: i32,
    /// Transaction id of the last child change.
    pub pzxid: i64,
}

impl Stat {
    /// Approximate payload size, with negative lengths clamped to zero.
    pub fn approximate_size(&self) -> u64 {
        u64::try_from(self.data_length).unwrap_or(0)
    }

    /// Returns true if the node is bound to a session.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral_owner != 0
    }
}

/// A node in the reconstructed namespace.
///
/// The path is the key in [`crate::DataTree`] and is not repeated here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNode {
    /// Payload, `None` when the snapshot recorded an absent buffer.
    pub data: Option<Vec<u8>>,
    /// Reference into the snapshot's ACL table.
    pub acl: i32,
    /// Stat metadata.
    pub stat: Stat,
    children: BTreeSet<String>,
}

impl DataNode {
    /// Creates a node with no children.
    pub fn new(data: Option<Vec<u8>>, acl: i32, stat: Stat) -> Self {
        Self {
            data,
            acl,
            stat,
            children: BTreeSet::new(),
        }
    }

    /// Immediate child names in sorted order.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.children.iter().map(String::as_str)
    }

    /// Number of immediate children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns true if the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn add_child(&mut self, name: &str) -> bool {
        self.children.insert(name.to_string())
    }
}
