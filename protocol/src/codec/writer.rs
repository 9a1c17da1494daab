//! The three [`ByteSink`] implementations.

use sha2::{Digest, Sha256};

use super::{var_uint_len, ByteSink};

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Buffers everything written to it.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl ByteSink for Writer {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

// ---------------------------------------------------------------------------
// Hasher
// ---------------------------------------------------------------------------

/// Feeds everything written to it into a running SHA-256 digest.
///
/// `Hasher` never buffers, so hashing a large threshold tree costs no more
/// memory than the digest state.
#[derive(Debug, Default, Clone)]
pub struct Hasher {
    digest: Sha256,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the hasher and return the 32-byte digest.
    pub fn finish(self) -> [u8; 32] {
        self.digest.finalize().into()
    }
}

impl ByteSink for Hasher {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

/// Counts bytes without materializing them.
///
/// The count saturates at `usize::MAX`, so bounds taken from untrusted
/// conditions never overflow.
#[derive(Debug, Default, Clone, Copy)]
pub struct Predictor {
    size: usize,
}

impl Predictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `len` bytes whose content does not matter.
    pub fn skip(&mut self, len: usize) {
        self.size = self.size.saturating_add(len);
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl ByteSink for Predictor {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.size = self.size.saturating_add(bytes.len());
    }

    fn write_var_uint(&mut self, value: u64) {
        self.size = self.size.saturating_add(var_uint_len(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive<S: ByteSink>(sink: &mut S) {
        sink.write_var_uint(8);
        sink.write_var_bytes(&[7u8; 32]);
        sink.write_var_bytes(b"");
        sink.write_var_uint(70_000);
        sink.write_uint8(0xff);
        sink.write_bytes(b"tail");
    }

    #[test]
    fn hasher_matches_sha256_of_writer_output() {
        let mut writer = Writer::new();
        let mut hasher = Hasher::new();
        drive(&mut writer);
        drive(&mut hasher);

        let expected: [u8; 32] = Sha256::digest(writer.as_bytes()).into();
        assert_eq!(hasher.finish(), expected);
    }

    #[test]
    fn predictor_matches_writer_length() {
        let mut writer = Writer::new();
        let mut predictor = Predictor::new();
        drive(&mut writer);
        drive(&mut predictor);
        assert_eq!(predictor.size(), writer.len());
    }

    #[test]
    fn predictor_skip_adds_length() {
        let mut predictor = Predictor::new();
        predictor.write_var_uint(64);
        predictor.skip(64);
        assert_eq!(predictor.size(), 65);
    }
}
