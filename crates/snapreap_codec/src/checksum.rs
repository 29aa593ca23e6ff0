//! Running Adler-32 checksum and a reader that folds every byte into it.

use std::io::{self, Read};

/// Largest prime smaller than 2^16.
const MOD_ADLER: u32 = 65_521;

/// Largest number of bytes that can be summed before `b` may overflow a u32.
const NMAX: usize = 5_552;

/// Order-sensitive 32-bit Adler checksum.
///
/// `a` is the byte sum and `b` the sum of the running `a` values, both
/// modulo 65521. The value is `(b << 16) | a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Creates a checksum over the empty input.
    pub const fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Folds `data` into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                self.a += u32::from(byte);
                self.b += self.a;
            }
            self.a %= MOD_ADLER;
            self.b %= MOD_ADLER;
        }
    }

    /// Returns the current checksum value.
    pub const fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Computes the checksum of a complete buffer.
    pub fn checksum(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.value()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a reader and checksums every byte delivered to the caller.
///
/// The checksum is only meaningful when the logical stream is consumed
/// once, in order. There is no seeking.
#[derive(Debug)]
pub struct ChecksumReader<R> {
    inner: R,
    adler: Adler32,
    bytes_read: u64,
}

impl<R: Read> ChecksumReader<R> {
    /// Creates a checksumming reader over `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            adler: Adler32::new(),
            bytes_read: 0,
        }
    }

    /// Returns the checksum of everything read so far.
    pub fn checksum(&self) -> u32 {
        self.adler.value()
    }

    /// Returns the number of bytes delivered so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Returns a reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consumes the wrapper and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.adler.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}
