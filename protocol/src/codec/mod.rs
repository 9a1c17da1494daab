//! # Binary / URI Codec
//!
//! Every condition and fulfillment type serializes itself through the
//! [`ByteSink`] trait. Three sinks implement it:
//!
//! ```text
//! Writer    : buffers the bytes (serialize_binary, URIs)
//! Hasher    : streams the bytes into SHA-256 (condition hashes)
//! Predictor : only counts the bytes (max_fulfillment_length bounds)
//! ```
//!
//! Because all three share the provided `write_var_uint`/`write_var_bytes`
//! methods, a hash computed through `Hasher` is always the SHA-256 of what
//! `Writer` would have buffered for the same calls.
//!
//! Integers are unsigned LEB128: low 7 bits first, continuation bit `0x80`
//! on every byte but the last. [`Reader`] is the inverse and rejects
//! overlong encodings, so every integer has exactly one wire form.

pub mod reader;
pub mod writer;

pub use reader::Reader;
pub use writer::{Hasher, Predictor, Writer};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

/// Longest LEB128 encoding of a `u64` (ceil(64 / 7)).
pub const MAX_VAR_UINT_LEN: usize = 10;

/// Errors raised while decoding binary or textual payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("out of bounds: need {requested} bytes at offset {offset}, {available} available")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        available: usize,
    },

    #[error("overlong var_uint encoding at offset {0}")]
    Overlong(usize),

    #[error("var_uint at offset {0} does not fit in 64 bits")]
    VarUintOverflow(usize),

    #[error("invalid base64url payload: {0}")]
    Base64(String),
}

/// Common interface of the three byte sinks.
///
/// Implementors only provide [`write_bytes`](ByteSink::write_bytes); the
/// variable-length helpers are shared so every sink sees identical byte
/// sequences for identical call sequences.
pub trait ByteSink {
    /// Append raw bytes.
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Append an unsigned LEB128 integer.
    fn write_var_uint(&mut self, value: u64) {
        let mut buf = [0u8; MAX_VAR_UINT_LEN];
        let len = encode_var_uint(value, &mut buf);
        self.write_bytes(&buf[..len]);
    }

    /// Append a length-prefixed byte string.
    fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_var_uint(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    /// Append a single byte.
    fn write_uint8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }
}

/// Encode `value` as LEB128 into `buf`, returning the number of bytes used.
pub fn encode_var_uint(mut value: u64, buf: &mut [u8; MAX_VAR_UINT_LEN]) -> usize {
    let mut len = 0;
    loop {
        let low = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf[len] = low;
            return len + 1;
        }
        buf[len] = low | 0x80;
        len += 1;
    }
}

/// Number of bytes `value` occupies as LEB128.
pub fn var_uint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Unpadded base64url, as used in condition and fulfillment URIs.
pub fn base64url_encode(bytes: &[u8]) -> String {
    let mut encoded = URL_SAFE.encode(bytes);
    while encoded.ends_with('=') {
        encoded.pop();
    }
    encoded
}

/// Decode unpadded base64url, re-adding `=` up to a multiple of four first.
pub fn base64url_decode(text: &str) -> Result<Vec<u8>, CodecError> {
    let mut padded = String::with_capacity(text.len() + 3);
    padded.push_str(text);
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| CodecError::Base64(e.to_string()))
}
