//! Streaming big-endian record decoder.

use crate::error::{CodecError, CodecResult};
use std::io::{ErrorKind, Read};

/// Maximum allowed buffer or string length.
/// This prevents allocation-based DoS from untrusted input.
pub const DEFAULT_MAX_BUFFER_LEN: u64 = 256 * 1024 * 1024;

/// Length prefix that encodes an absent buffer.
pub const ABSENT_LENGTH: i32 = -1;

/// Upper bound on the up-front allocation for a single buffer.
const INITIAL_CAPACITY_LIMIT: usize = 64 * 1024;

/// Decodes fixed-width primitives and length-prefixed buffers from a stream.
///
/// Record shapes are fixed sequences of these primitives. The decoder
/// carries no schema of its own.
#[derive(Debug)]
pub struct RecordDecoder<R> {
    reader: R,
    max_buffer_len: u64,
}

impl<R: Read> RecordDecoder<R> {
    /// Creates a decoder with the default buffer length limit.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
        }
    }

    /// Sets the largest buffer length the decoder will accept.
    #[must_use]
    pub fn with_max_buffer_len(mut self, max: u64) -> Self {
        self.max_buffer_len = max;
        self
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Returns a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consumes the decoder and returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads a big-endian signed 32-bit integer.
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        let mut bytes = [0u8; 4];
        self.fill(&mut bytes, "int32")?;
        Ok(i32::from_be_bytes(bytes))
    }

    /// Reads a big-endian signed 64-bit integer.
    pub fn read_i64(&mut self) -> CodecResult<i64> {
        let mut bytes = [0u8; 8];
        self.fill(&mut bytes, "int64")?;
        Ok(i64::from_be_bytes(bytes))
    }

    /// Reads a single-byte boolean. Any nonzero byte is true.
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        let mut byte = [0u8; 1];
        self.fill(&mut byte, "bool")?;
        Ok(byte[0] != 0)
    }

    /// Reads a length-prefixed buffer.
    ///
    /// Returns `None` for the absent marker (length `-1`), which is distinct
    /// from a present zero-length buffer.
    pub fn read_buffer(&mut self) -> CodecResult<Option<Vec<u8>>> {
        let len = self.read_i32()?;
        if len == ABSENT_LENGTH {
            return Ok(None);
        }
        self.read_body(len, "buffer").map(Some)
    }

    /// Reads a length-prefixed UTF-8 string. Strings may not be absent.
    pub fn read_string(&mut self) -> CodecResult<String> {
        let len = self.read_i32()?;
        let bytes = self.read_body(len, "string")?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    fn read_body(&mut self, len: i32, field: &'static str) -> CodecResult<Vec<u8>> {
        let len = u64::try_from(len)
            .map_err(|_| CodecError::format(format!("negative {field} length {len}")))?;
        if len > self.max_buffer_len {
            return Err(CodecError::LengthLimitExceeded {
                claimed: len,
                max_allowed: self.max_buffer_len,
            });
        }

        // Grow as bytes arrive instead of trusting the prefix for allocation.
        let capacity = usize::try_from(len)
            .unwrap_or(usize::MAX)
            .min(INITIAL_CAPACITY_LIMIT);
        let mut body = Vec::with_capacity(capacity);
        let got = (&mut self.reader).take(len).read_to_end(&mut body)?;
        let got = got as u64;
        if got < len {
            return Err(CodecError::Truncated {
                field,
                needed: usize::try_from(len - got).unwrap_or(usize::MAX),
            });
        }
        Ok(body)
    }

    fn fill(&mut self, buf: &mut [u8], field: &'static str) -> CodecResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(CodecError::Truncated {
                        field,
                        needed: buf.len() - filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(CodecError::Io(e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn decoder(bytes: &[u8]) -> RecordDecoder<&[u8]> {
        RecordDecoder::new(bytes)
    }

    #[test]
    fn decode_integers_big_endian() {
        let mut d = decoder(&[
            0x00, 0x00, 0x01, 0x02, //
            0xff, 0xff, 0xff, 0xfe, //
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
        ]);
        assert_eq!(d.read_i32().unwrap(), 258);
        assert_eq!(d.read_i32().unwrap(), -2);
        assert_eq!(d.read_i64().unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn decode_bool() {
        let mut d = decoder(&[0, 1, 7]);
        assert!(!d.read_bool().unwrap());
        assert!(d.read_bool().unwrap());
        assert!(d.read_bool().unwrap());
    }

    #[test]
    fn absent_buffer_differs_from_empty() {
        let mut d = decoder(&[0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
        assert_eq!(d.read_buffer().unwrap(), None);
        assert_eq!(d.read_buffer().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn decode_buffer_and_string() {
        let mut d = decoder(&[0, 0, 0, 3, 1, 2, 3, 0, 0, 0, 4, b'/', b'a', b'/', b'b']);
        assert_eq!(d.read_buffer().unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(d.read_string().unwrap(), "/a/b");
    }

    #[test]
    fn negative_length_is_format_error() {
        let mut d = decoder(&[0xff, 0xff, 0xff, 0xf9]);
        assert!(matches!(d.read_buffer(), Err(CodecError::Format { .. })));
    }

    #[test]
    fn absent_string_is_format_error() {
        let mut d = decoder(&[0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(d.read_string(), Err(CodecError::Format { .. })));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut d = decoder(&[0, 0, 0, 2, 0xff, 0xfe]);
        assert!(matches!(d.read_string(), Err(CodecError::InvalidUtf8)));
    }

    #[test]
    fn truncated_integer() {
        let mut d = decoder(&[0, 0, 1]);
        assert!(matches!(
            d.read_i32(),
            Err(CodecError::Truncated {
                field: "int32",
                needed: 1
            })
        ));
    }

    #[test]
    fn truncated_buffer_body() {
        let mut d = decoder(&[0, 0, 0, 10, 1, 2, 3]);
        assert!(matches!(
            d.read_buffer(),
            Err(CodecError::Truncated {
                field: "buffer",
                needed: 7
            })
        ));
    }

    #[test]
    fn length_limit_enforced() {
        let mut d = decoder(&[0, 0, 1, 0]).with_max_buffer_len(255);
        assert!(matches!(
            d.read_buffer(),
            Err(CodecError::LengthLimitExceeded {
                claimed: 256,
                max_allowed: 255
            })
        ));
    }

    #[test]
    fn huge_claim_does_not_preallocate() {
        // 2 GiB claim backed by three bytes must fail as truncation.
        let mut d = decoder(&[0x7f, 0xff, 0xff, 0xff, 1, 2, 3]).with_max_buffer_len(u64::MAX);
        assert!(matches!(d.read_buffer(), Err(CodecError::Truncated { .. })));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[test]
    fn io_errors_propagate() {
        let mut d = RecordDecoder::new(FailingReader);
        assert!(matches!(d.read_i64(), Err(CodecError::Io(_))));
    }

    struct OneByteReader<'a>(&'a [u8]);

    impl Read for OneByteReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    #[test]
    fn short_reads_are_reassembled() {
        let bytes = 0x1122_3344_5566_7788i64.to_be_bytes();
        let mut d = RecordDecoder::new(OneByteReader(&bytes));
        assert_eq!(d.read_i64().unwrap(), 0x1122_3344_5566_7788);
    }
}
