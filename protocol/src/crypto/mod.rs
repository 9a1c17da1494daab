//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for every signature in the ledger.
//! - **SHA-256** (`sha2`) for every digest.
//! - **base58** (`bs58`) for the textual form of keys.

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256_hex};
pub use keys::{KeyError, Keypair, PublicKey, Signature, SIGNATURE_LENGTH};
