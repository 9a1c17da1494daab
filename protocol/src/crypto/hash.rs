//! # Hashing Utilities
//!
//! SHA-256 is the only digest in the ledger: condition hashes, transaction
//! ids, the signed per-input message and block ids all use it. Conditions
//! stream through [`codec::Hasher`](crate::codec::Hasher); everything else
//! hashes a finished byte string through the helpers below.

use sha2::{Digest, Sha256};

/// SHA-256 as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 as lowercase hex. Transaction and block ids use this form.
///
/// # Example
///
/// ```
/// use ccledger_protocol::crypto::sha256_hex;
///
/// assert_eq!(sha256_hex(b"").len(), 64);
/// ```
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
