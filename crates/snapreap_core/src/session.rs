//! Session table loaded alongside the tree.

use std::collections::HashMap;

/// Session id to negotiated timeout (milliseconds).
///
/// Loaded verbatim. Later entries for the same id overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTable {
    sessions: HashMap<i64, i32>,
}

impl SessionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a session, returning the timeout it replaced.
    pub fn insert(&mut self, session_id: i64, timeout: i32) -> Option<i32> {
        self.sessions.insert(session_id, timeout)
    }

    /// Returns the timeout of a session.
    pub fn get(&self, session_id: i64) -> Option<i32> {
        self.sessions.get(&session_id).copied()
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions ordered by id.
    pub fn sorted(&self) -> Vec<(i64, i32)> {
        let mut entries: Vec<(i64, i32)> = self.sessions.iter().map(|(&k, &v)| (k, v)).collect();
        entries.sort_unstable_by_key(|&(id, _)| id);
        entries
    }
}

impl FromIterator<(i64, i32)> for SessionTable {
    fn from_iter<I: IntoIterator<Item = (i64, i32)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (id, timeout) in iter {
            table.insert(id, timeout);
        }
        table
    }
}
