//! Snapshot loading and writing.
//!
//! # Format
//!
//! ```text
//! header    magic:int32 "ZKSN" | version:int32 | dbId:int64
//! nodes     { path:string | data:buffer | acl:int32 | stat } ...  path "" ends the section
//! stat      ctime:int64 | mtime:int64 | version:int32 | cversion:int32 | aversion:int32
//!           | ephemeralOwner:int64 | dataLength:int32 | pzxid:int64
//! sessions  { count:int32 | { id:int64 | timeout:int32 } * count } ...  count 0 ends the section
//! trailer   adler32:int32 over every preceding byte
//! ```
//!
//! All integers are big-endian. Nodes appear parent-first.

use crate::error::{CoreError, CoreResult};
use crate::node::{DataNode, Stat};
use crate::session::SessionTable;
use crate::tree::{DataTree, ROOT_PATH};
use snapreap_codec::{Adler32, ChecksumReader, RecordDecoder, RecordEncoder, DEFAULT_MAX_BUFFER_LEN};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Magic number identifying a snapshot (`ZKSN`).
pub const SNAPSHOT_MAGIC: i32 = 0x5A4B_534E;

/// The only snapshot format version this crate reads.
pub const SNAPSHOT_VERSION: i32 = 2;

/// Path value that terminates the node section.
const END_OF_NODES: &str = "";

/// Fixed snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Format marker, always [`SNAPSHOT_MAGIC`].
    pub magic: i32,
    /// Format version.
    pub version: i32,
    /// Identifier of the database that produced the snapshot.
    pub db_id: i64,
}

impl SnapshotHeader {
    /// Creates a header for the current format.
    pub const fn new(db_id: i64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            db_id,
        }
    }
}

/// Options controlling how a snapshot is read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Largest data buffer or path accepted.
    pub max_buffer_len: u64,
    /// Whether a trailer mismatch fails the load.
    pub verify_checksum: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
            verify_checksum: true,
        }
    }
}

impl LoadOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest accepted buffer length.
    #[must_use]
    pub const fn max_buffer_len(mut self, max: u64) -> Self {
        self.max_buffer_len = max;
        self
    }

    /// Sets whether the trailer checksum is enforced.
    #[must_use]
    pub const fn verify_checksum(mut self, value: bool) -> Self {
        self.verify_checksum = value;
        self
    }
}

/// A fully materialized snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Header fields.
    pub header: SnapshotHeader,
    /// The namespace tree.
    pub tree: DataTree,
    /// The session table.
    pub sessions: SessionTable,
}

impl Snapshot {
    /// Creates a snapshot from parts, typically for writing.
    pub fn new(header: SnapshotHeader, tree: DataTree, sessions: SessionTable) -> Self {
        Self {
            header,
            tree,
            sessions,
        }
    }

    /// Opens and loads a snapshot file with default options.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::load_with`].
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with(path, &LoadOptions::default())
    }

    /// Opens and loads a snapshot file.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::load_with`].
    pub fn open_with(path: impl AsRef<Path>, options: &LoadOptions) -> CoreResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening snapshot");
        let file = File::open(path)?;
        Self::load_with(BufReader::new(file), options)
    }

    /// Loads a snapshot from a stream with default options.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::load_with`].
    pub fn load<R: Read>(reader: R) -> CoreResult<Self> {
        Self::load_with(reader, &LoadOptions::default())
    }

    /// Loads a snapshot from a stream.
    ///
    /// The whole stream is consumed and verified before anything is returned.
    ///
    /// # Errors
    ///
    /// - `Io` if the stream fails
    /// - `Truncated` if it ends inside a record
    /// - `UnsupportedFormat` for a foreign magic or version
    /// - `Format` for malformed records, including out-of-order nodes
    /// - `ChecksumMismatch` if the trailer does not match
    pub fn load_with<R: Read>(reader: R, options: &LoadOptions) -> CoreResult<Self> {
        let mut decoder = RecordDecoder::new(ChecksumReader::new(reader))
            .with_max_buffer_len(options.max_buffer_len);

        let header = read_header(&mut decoder)?;
        debug!(db_id = header.db_id, "snapshot header accepted");

        let tree = read_nodes(&mut decoder)?;
        debug!(nodes = tree.len(), "node section loaded");

        let sessions = read_sessions(&mut decoder)?;
        debug!(sessions = sessions.len(), "session section loaded");

        // The trailer is not part of its own checksum.
        let actual = decoder.get_ref().checksum();
        let expected = decoder.read_i32()? as u32;
        if expected != actual {
            if options.verify_checksum {
                return Err(CoreError::ChecksumMismatch { expected, actual });
            }
            warn!(
                expected = %format!("{expected:08x}"),
                actual = %format!("{actual:08x}"),
                "snapshot checksum mismatch ignored"
            );
        }

        info!(
            nodes = tree.len(),
            sessions = sessions.len(),
            bytes = decoder.get_ref().bytes_read(),
            "snapshot loaded"
        );
        Ok(Self {
            header,
            tree,
            sessions,
        })
    }

    /// Serializes the snapshot, trailer included.
    ///
    /// Nodes are written in pre-order so that every parent precedes its
    /// children. Sessions are written as a single batch ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a format error if the tree has no root, or if a field is too
    /// large for its length prefix.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        if self.tree.root().is_none() {
            return Err(CoreError::format("cannot write a tree without a root"));
        }

        let mut enc = RecordEncoder::with_capacity(64 * self.tree.len() + 64);
        enc.write_i32(self.header.magic)
            .write_i32(self.header.version)
            .write_i64(self.header.db_id);

        for (path, node) in self.tree.walk(ROOT_PATH) {
            write_node(&mut enc, &path, node)?;
        }
        enc.write_string(END_OF_NODES)?;

        let sessions = self.sessions.sorted();
        if !sessions.is_empty() {
            let count = i32::try_from(sessions.len())
                .map_err(|_| CoreError::format("too many sessions for one batch"))?;
            enc.write_i32(count);
            for (id, timeout) in sessions {
                enc.write_i64(id).write_i32(timeout);
            }
        }
        enc.write_i32(0);

        let checksum = Adler32::checksum(enc.as_bytes());
        enc.write_i32(checksum as i32);
        Ok(enc.into_bytes())
    }

    /// Writes the serialized snapshot to `writer`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Snapshot::encode`] or an I/O error.
    pub fn write_to<W: Write>(&self, mut writer: W) -> CoreResult<()> {
        let bytes = self.encode()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}

fn read_header<R: Read>(decoder: &mut RecordDecoder<R>) -> CoreResult<SnapshotHeader> {
    let magic = decoder.read_i32()?;
    if magic != SNAPSHOT_MAGIC {
        return Err(CoreError::unsupported(format!(
            "bad magic {magic:#010x}, expected {SNAPSHOT_MAGIC:#010x}"
        )));
    }
    let version = decoder.read_i32()?;
    if version != SNAPSHOT_VERSION {
        return Err(CoreError::unsupported(format!(
            "version {version}, expected {SNAPSHOT_VERSION}"
        )));
    }
    let db_id = decoder.read_i64()?;
    Ok(SnapshotHeader {
        magic,
        version,
        db_id,
    })
}

fn read_nodes<R: Read>(decoder: &mut RecordDecoder<R>) -> CoreResult<DataTree> {
    let mut tree = DataTree::new();
    loop {
        let path = decoder.read_string()?;
        if path == END_OF_NODES {
            break;
        }
        if tree.is_empty() && path != ROOT_PATH {
            return Err(CoreError::format(format!(
                "out-of-order node {path}: root must come first"
            )));
        }
        let data = decoder.read_buffer()?;
        let acl = decoder.read_i32()?;
        let stat = read_stat(decoder)?;
        tree.insert(&path, DataNode::new(data, acl, stat))?;
    }
    if tree.root().is_none() {
        return Err(CoreError::format("node section has no root"));
    }
    Ok(tree)
}

fn read_stat<R: Read>(decoder: &mut RecordDecoder<R>) -> CoreResult<Stat> {
    Ok(Stat {
        ctime: decoder.read_i64()?,
        mtime: decoder.read_i64()?,
        version: decoder.read_i32()?,
        cversion: decoder.read_i32()?,
        aversion: decoder.read_i32()?,
        ephemeral_owner: decoder.read_i64()?,
        data_length: decoder.read_i32()?,
        pzxid: decoder.read_i64()?,
    })
}

fn read_sessions<R: Read>(decoder: &mut RecordDecoder<R>) -> CoreResult<SessionTable> {
    let mut sessions = SessionTable::new();
    loop {
        let count = decoder.read_i32()?;
        if count == 0 {
            break;
        }
        if count < 0 {
            return Err(CoreError::format(format!("negative session count {count}")));
        }
        for _ in 0..count {
            let id = decoder.read_i64()?;
            let timeout = decoder.read_i32()?;
            sessions.insert(id, timeout);
        }
    }
    Ok(sessions)
}

fn write_node(enc: &mut RecordEncoder, path: &str, node: &DataNode) -> CoreResult<()> {
    enc.write_string(path)?;
    enc.write_buffer(node.data.as_deref())?;
    let stat = &node.stat;
    enc.write_i32(node.acl)
        .write_i64(stat.ctime)
        .write_i64(stat.mtime)
        .write_i32(stat.version)
        .write_i32(stat.cversion)
        .write_i32(stat.aversion)
        .write_i64(stat.ephemeral_owner)
        .write_i32(stat.data_length)
        .write_i64(stat.pzxid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(version: i32, data_length: i32) -> Stat {
        Stat {
            ctime: 1_000,
            mtime: 2_000,
            version,
            cversion: 1,
            aversion: 0,
            ephemeral_owner: 0,
            data_length,
            pzxid: 99,
        }
    }

    fn sample() -> Snapshot {
        let mut tree = DataTree::new();
        tree.insert("/", DataNode::new(None, -1, stat(0, 0))).unwrap();
        tree.insert("/jobs", DataNode::new(Some(Vec::new()), 1, stat(3, 0)))
            .unwrap();
        tree.insert("/jobs/old", DataNode::new(Some(b"abc".to_vec()), 1, stat(7, 3)))
            .unwrap();
        let sessions: SessionTable = [(0x1000, 30_000), (0x2000, 4_000)].into_iter().collect();
        Snapshot::new(SnapshotHeader::new(42), tree, sessions)
    }

    /// Raw stream builder for malformed inputs.
    fn raw_node(enc: &mut RecordEncoder, path: &str) {
        enc.write_string(path).unwrap();
        enc.write_buffer(None).unwrap();
        enc.write_i32(-1);
        for _ in 0..2 {
            enc.write_i64(0);
        }
        enc.write_i32(0).write_i32(0).write_i32(0);
        enc.write_i64(0).write_i32(0).write_i64(0);
    }

    fn finish(mut enc: RecordEncoder) -> Vec<u8> {
        let checksum = Adler32::checksum(enc.as_bytes());
        enc.write_i32(checksum as i32);
        enc.into_bytes()
    }

    fn header(enc: &mut RecordEncoder) {
        enc.write_i32(SNAPSHOT_MAGIC)
            .write_i32(SNAPSHOT_VERSION)
            .write_i64(1);
    }

    #[test]
    fn round_trip() {
        let original = sample();
        let bytes = original.encode().unwrap();
        let loaded = Snapshot::load(&bytes[..]).unwrap();

        assert_eq!(loaded.header, original.header);
        assert_eq!(loaded.tree.len(), 3);
        assert_eq!(loaded.sessions, original.sessions);
        for (path, node) in original.tree.walk("/") {
            assert_eq!(loaded.tree.get(&path), Some(node), "{path}");
        }
    }

    #[test]
    fn absent_and_empty_data_preserved() {
        let bytes = sample().encode().unwrap();
        let loaded = Snapshot::load(&bytes[..]).unwrap();
        assert_eq!(loaded.tree.get("/").unwrap().data, None);
        assert_eq!(loaded.tree.get("/jobs").unwrap().data, Some(Vec::new()));
    }

    #[test]
    fn flipped_byte_is_corrupt() {
        let mut bytes = sample().encode().unwrap();
        // Inside the payload of /jobs/old.
        let pos = bytes.windows(3).position(|w| w == b"abc").unwrap();
        bytes[pos] ^= 0x01;
        assert!(matches!(
            Snapshot::load(&bytes[..]),
            Err(CoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn checksum_can_be_ignored() {
        let mut bytes = sample().encode().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let options = LoadOptions::new().verify_checksum(false);
        assert!(Snapshot::load_with(&bytes[..], &options).is_ok());
    }

    #[test]
    fn bad_magic_is_unsupported() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            Snapshot::load(&bytes[..]),
            Err(CoreError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn bad_version_is_unsupported() {
        let mut enc = RecordEncoder::new();
        enc.write_i32(SNAPSHOT_MAGIC).write_i32(1).write_i64(0);
        assert!(matches!(
            Snapshot::load(enc.as_bytes()),
            Err(CoreError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn truncation_is_reported() {
        let bytes = sample().encode().unwrap();
        for cut in [3, 20, bytes.len() - 5, bytes.len() - 1] {
            assert!(
                matches!(
                    Snapshot::load(&bytes[..cut]),
                    Err(CoreError::Truncated { .. })
                ),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn out_of_order_node_rejected() {
        let mut enc = RecordEncoder::new();
        header(&mut enc);
        raw_node(&mut enc, "/");
        raw_node(&mut enc, "/a/b");
        raw_node(&mut enc, "/a");
        enc.write_string("").unwrap();
        enc.write_i32(0);
        let bytes = finish(enc);

        let err = Snapshot::load(&bytes[..]).unwrap_err();
        assert!(matches!(err, CoreError::Format { .. }));
        assert!(err.to_string().contains("/a/b"));
    }

    #[test]
    fn root_must_come_first() {
        let mut enc = RecordEncoder::new();
        header(&mut enc);
        raw_node(&mut enc, "/a");
        assert!(matches!(
            Snapshot::load(enc.as_bytes()),
            Err(CoreError::Format { .. })
        ));
    }

    #[test]
    fn empty_node_section_rejected() {
        let mut enc = RecordEncoder::new();
        header(&mut enc);
        enc.write_string("").unwrap();
        enc.write_i32(0);
        let bytes = finish(enc);
        assert!(matches!(
            Snapshot::load(&bytes[..]),
            Err(CoreError::Format { .. })
        ));
    }

    #[test]
    fn session_batches_and_last_write_wins() {
        let mut enc = RecordEncoder::new();
        header(&mut enc);
        raw_node(&mut enc, "/");
        enc.write_string("").unwrap();
        enc.write_i32(2).write_i64(5).write_i32(100).write_i64(6).write_i32(200);
        enc.write_i32(1).write_i64(5).write_i32(300);
        enc.write_i32(0);
        let bytes = finish(enc);

        let snapshot = Snapshot::load(&bytes[..]).unwrap();
        assert_eq!(snapshot.sessions.len(), 2);
        assert_eq!(snapshot.sessions.get(5), Some(300));
        assert_eq!(snapshot.sessions.get(6), Some(200));
    }

    #[test]
    fn negative_session_count_rejected() {
        let mut enc = RecordEncoder::new();
        header(&mut enc);
        raw_node(&mut enc, "/");
        enc.write_string("").unwrap();
        enc.write_i32(-3);
        assert!(matches!(
            Snapshot::load(enc.as_bytes()),
            Err(CoreError::Format { .. })
        ));
    }

    #[test]
    fn writer_refuses_rootless_tree() {
        let snapshot = Snapshot::new(SnapshotHeader::new(0), DataTree::new(), SessionTable::new());
        assert!(matches!(snapshot.encode(), Err(CoreError::Format { .. })));
    }

    #[test]
    fn open_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        sample().write_to(file.as_file_mut()).unwrap();
        file.flush().unwrap();

        let snapshot = Snapshot::open(file.path()).unwrap();
        assert_eq!(snapshot.tree.len(), 3);
        assert_eq!(snapshot.header.db_id, 42);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Snapshot::open(dir.path().join("snapshot.0")),
            Err(CoreError::Io(_))
        ));
    }
}
