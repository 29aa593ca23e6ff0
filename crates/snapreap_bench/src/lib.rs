//! Benchmark utilities.

use snapreap_core::Snapshot;
use snapreap_testkit::{scenarios, SnapshotBuilder, FIXED_NOW_MS};

/// Deterministic payload of the specified size.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// A snapshot with `count` sibling nodes under `/bulk`, each carrying
/// `payload_size` bytes.
pub fn bulk_snapshot(count: usize, payload_size: usize) -> Snapshot {
    let data = payload(payload_size);
    let mut builder = SnapshotBuilder::new(FIXED_NOW_MS).node("/bulk", 0);
    for i in 0..count {
        builder = builder.node_with_data(&format!("/bulk/n{i:06}"), (i % 90) as i64, &data);
    }
    builder.build()
}

/// `width` expired subtrees of `depth` nested nodes each.
pub fn wide_snapshot(width: usize, depth: usize) -> Snapshot {
    scenarios::wide(FIXED_NOW_MS, width, depth).build()
}
