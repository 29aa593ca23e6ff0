//! Raw and damaged snapshot streams.
//!
//! [`RawSnapshot`] writes records without any of the checks the real writer
//! applies, so tests can produce out-of-order, duplicate or otherwise
//! malformed input that still carries a valid checksum.

use snapreap_codec::{Adler32, RecordEncoder};
use snapreap_core::{Stat, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};

/// Unchecked snapshot stream builder.
#[derive(Debug, Default)]
pub struct RawSnapshot {
    enc: RecordEncoder,
}

impl RawSnapshot {
    /// Starts an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a stream with a valid header.
    pub fn with_header(db_id: i64) -> Self {
        Self::new().header(SNAPSHOT_MAGIC, SNAPSHOT_VERSION, db_id)
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, magic: i32, version: i32, db_id: i64) -> Self {
        self.enc.write_i32(magic).write_i32(version).write_i64(db_id);
        self
    }

    /// Appends a node record.
    #[must_use]
    pub fn node(mut self, path: &str, data: Option<&[u8]>, stat: &Stat) -> Self {
        self.enc
            .write_string(path)
            .and_then(|enc| enc.write_buffer(data))
            .expect("Record too large");
        self.enc
            .write_i32(0)
            .write_i64(stat.ctime)
            .write_i64(stat.mtime)
            .write_i32(stat.version)
            .write_i32(stat.cversion)
            .write_i32(stat.aversion)
            .write_i64(stat.ephemeral_owner)
            .write_i32(stat.data_length)
            .write_i64(stat.pzxid);
        self
    }

    /// Appends the node section terminator.
    #[must_use]
    pub fn end_nodes(mut self) -> Self {
        self.enc.write_string("").expect("Empty string");
        self
    }

    /// Appends one session batch.
    #[must_use]
    pub fn sessions(mut self, sessions: &[(i64, i32)]) -> Self {
        let count = i32::try_from(sessions.len()).expect("Too many sessions");
        self.enc.write_i32(count);
        for (id, timeout) in sessions {
            self.enc.write_i64(*id).write_i32(*timeout);
        }
        self
    }

    /// Appends the session section terminator.
    #[must_use]
    pub fn end_sessions(mut self) -> Self {
        self.enc.write_i32(0);
        self
    }

    /// Appends a bare int32.
    #[must_use]
    pub fn int32(mut self, value: i32) -> Self {
        self.enc.write_i32(value);
        self
    }

    /// Appends raw bytes.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.enc.write_raw(bytes);
        self
    }

    /// Returns the bytes written so far, without a trailer.
    pub fn unterminated(self) -> Vec<u8> {
        self.enc.into_bytes()
    }

    /// Appends the correct checksum trailer and returns the stream.
    pub fn finish(self) -> Vec<u8> {
        let checksum = Adler32::checksum(self.enc.as_bytes());
        self.finish_with_checksum(checksum)
    }

    /// Appends the given trailer and returns the stream.
    pub fn finish_with_checksum(mut self, checksum: u32) -> Vec<u8> {
        self.enc.write_raw(&checksum.to_be_bytes());
        self.enc.into_bytes()
    }
}

/// Returns a copy of `bytes` with every bit of one byte inverted.
pub fn flip_byte(bytes: &[u8], index: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out[index] ^= 0xFF;
    out
}

/// Returns the first `len` bytes.
pub fn truncate(bytes: &[u8], len: usize) -> Vec<u8> {
    bytes[..len.min(bytes.len())].to_vec()
}

/// Recomputes the trailer after the body was edited.
pub fn fix_checksum(bytes: &mut [u8]) {
    let body = bytes.len() - 4;
    let checksum = Adler32::checksum(&bytes[..body]);
    bytes[body..].copy_from_slice(&checksum.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapreap_core::{CoreError, Snapshot};

    fn stat() -> Stat {
        Stat::default()
    }

    #[test]
    fn raw_stream_loads() {
        let bytes = RawSnapshot::with_header(3)
            .node("/", None, &stat())
            .node("/a", Some(b"x"), &stat())
            .end_nodes()
            .sessions(&[(1, 100)])
            .end_sessions()
            .finish();
        let snapshot = Snapshot::load(bytes.as_slice()).unwrap();
        assert_eq!(snapshot.header.db_id, 3);
        assert_eq!(snapshot.tree.len(), 2);
    }

    #[test]
    fn duplicate_path_rejected() {
        let bytes = RawSnapshot::with_header(1)
            .node("/", None, &stat())
            .node("/a", None, &stat())
            .node("/a", None, &stat())
            .end_nodes()
            .end_sessions()
            .finish();
        assert!(matches!(
            Snapshot::load(bytes.as_slice()),
            Err(CoreError::Format { .. })
        ));
    }

    #[test]
    fn fixed_checksum_exposes_structural_error() {
        let mut bytes = RawSnapshot::with_header(1)
            .node("/", None, &stat())
            .end_nodes()
            .end_sessions()
            .finish();
        // Corrupt the version field, then repair the trailer.
        bytes[7] = 9;
        fix_checksum(&mut bytes);
        assert!(matches!(
            Snapshot::load(bytes.as_slice()),
            Err(CoreError::UnsupportedFormat { .. })
        ));
    }

    fn load_err(bytes: &[u8]) -> CoreError {
        Snapshot::load(bytes).unwrap_err()
    }

    #[test]
    fn negative_data_length_rejected() {
        let bytes = RawSnapshot::with_header(1)
            .node("/", None, &stat())
            .int32(2)
            .raw(b"/a")
            .int32(-5)
            .finish();
        assert!(matches!(load_err(&bytes), CoreError::Format { .. }));
    }

    #[test]
    fn absent_path_rejected() {
        let bytes = RawSnapshot::with_header(1)
            .node("/", None, &stat())
            .int32(-1)
            .end_nodes()
            .end_sessions()
            .finish();
        assert!(matches!(load_err(&bytes), CoreError::Format { .. }));
    }

    #[test]
    fn invalid_utf8_path_rejected() {
        let bytes = RawSnapshot::with_header(1)
            .node("/", None, &stat())
            .int32(2)
            .raw(&[b'/', 0xFF])
            .int32(-1)
            .finish();
        let err = load_err(&bytes);
        assert!(matches!(err, CoreError::Format { .. }));
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn missing_trailer_is_truncation() {
        let bytes = RawSnapshot::with_header(1)
            .node("/", None, &stat())
            .end_nodes()
            .end_sessions()
            .unterminated();
        assert!(matches!(load_err(&bytes), CoreError::Truncated { .. }));
    }

    #[test]
    fn helpers() {
        assert_eq!(flip_byte(&[0x0F, 1], 0), vec![0xF0, 1]);
        assert_eq!(truncate(&[1, 2, 3], 2), vec![1, 2]);
        assert_eq!(truncate(&[1, 2, 3], 10), vec![1, 2, 3]);
    }
}
