//! Big-endian record encoder, the inverse of [`crate::RecordDecoder`].

use crate::decoder::ABSENT_LENGTH;
use crate::error::{CodecError, CodecResult};

/// Appends fixed-width primitives and length-prefixed buffers to a byte vector.
#[derive(Debug, Default)]
pub struct RecordEncoder {
    buffer: Vec<u8>,
}

impl RecordEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Writes a big-endian signed 32-bit integer.
    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Writes a big-endian signed 64-bit integer.
    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Writes a single-byte boolean.
    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.buffer.push(u8::from(value));
        self
    }

    /// Writes a length-prefixed buffer, or the absent marker for `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is longer than `i32::MAX` bytes, which
    /// the length prefix cannot represent.
    pub fn write_buffer(&mut self, data: Option<&[u8]>) -> CodecResult<&mut Self> {
        match data {
            None => Ok(self.write_i32(ABSENT_LENGTH)),
            Some(bytes) => self.write_bytes(bytes),
        }
    }

    /// Writes a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is longer than `i32::MAX` bytes.
    pub fn write_string(&mut self, value: &str) -> CodecResult<&mut Self> {
        self.write_bytes(value.as_bytes())
    }

    /// Appends raw bytes with no length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<&mut Self> {
        let len = i32::try_from(bytes.len()).map_err(|_| CodecError::LengthLimitExceeded {
            claimed: bytes.len() as u64,
            max_allowed: i32::MAX as u64,
        })?;
        self.write_i32(len);
        self.buffer.extend_from_slice(bytes);
        Ok(self)
    }
}
