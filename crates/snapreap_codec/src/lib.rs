//! # Snapreap Codec
//!
//! Checksummed big-endian record codec for namespace snapshots and the
//! namespace service's wire protocol.
//!
//! This crate provides:
//! - [`Adler32`] and [`ChecksumReader`], which fold every delivered byte into a
//!   running 32-bit checksum
//! - [`RecordDecoder`] for fixed-width integers, booleans, and length-prefixed
//!   buffers and strings
//! - [`RecordEncoder`], its inverse
//!
//! ## Encoding Rules
//!
//! - Integers are big-endian two's complement
//! - Booleans are one byte, nonzero is true
//! - Buffers carry an `int32` length prefix, `-1` meaning absent
//! - Strings are present buffers holding UTF-8
//!
//! ## Usage
//!
//! ```
//! use snapreap_codec::{ChecksumReader, RecordDecoder, RecordEncoder};
//!
//! let mut enc = RecordEncoder::new();
//! enc.write_string("/app").unwrap().write_i64(42);
//! let bytes = enc.into_bytes();
//!
//! let mut dec = RecordDecoder::new(ChecksumReader::new(&bytes[..]));
//! assert_eq!(dec.read_string().unwrap(), "/app");
//! assert_eq!(dec.read_i64().unwrap(), 42);
//! assert_eq!(dec.get_ref().bytes_read(), bytes.len() as u64);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checksum;
mod decoder;
mod encoder;
mod error;

pub use checksum::{Adler32, ChecksumReader};
pub use decoder::{RecordDecoder, ABSENT_LENGTH, DEFAULT_MAX_BUFFER_LEN};
pub use encoder::RecordEncoder;
pub use error::{CodecError, CodecResult};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn checksum_reader_matches_one_shot(data in prop::collection::vec(any::<u8>(), 0..4096)) {
            let mut enc = RecordEncoder::new();
            enc.write_buffer(Some(&data)).unwrap();
            let bytes = enc.into_bytes();

            let mut dec = RecordDecoder::new(ChecksumReader::new(&bytes[..]));
            let decoded = dec.read_buffer().unwrap();
            prop_assert_eq!(decoded.as_deref(), Some(&data[..]));
            prop_assert_eq!(dec.get_ref().checksum(), Adler32::checksum(&bytes));
        }

        #[test]
        fn strings_survive(s in "\\PC{0,64}") {
            let mut enc = RecordEncoder::new();
            enc.write_string(&s).unwrap();
            let bytes = enc.into_bytes();
            let mut dec = RecordDecoder::new(&bytes[..]);
            prop_assert_eq!(dec.read_string().unwrap(), s);
        }
    }
}
