//! # Key Management
//!
//! Ed25519 keypairs for ledger participants.
//!
//! Public keys travel as base58 strings everywhere a human or a JSON
//! document sees them (`owners_before`, `owners_after`, condition details).
//! Inside condition payloads they are the raw 32 bytes.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (thanks, ed25519-dalek).
//! - Key generation uses `OsRng`.
//! - Secret bytes are never logged, displayed or serialized implicitly.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* a secret failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid secret key: wrong length or bad encoding")]
    InvalidSecretKey,

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// An Ed25519 signing keypair.
///
/// `Keypair` intentionally does NOT implement `Serialize`. Exporting a
/// secret is an explicit call to [`secret_base58`](Self::secret_base58).
///
/// # Examples
///
/// ```
/// use ccledger_protocol::crypto::Keypair;
///
/// let kp = Keypair::generate();
/// let sig = kp.sign(b"spend output 0");
/// assert!(kp.public_key().verify(b"spend output 0", &sig));
/// ```
pub struct Keypair {
    signing_key: SigningKey,
}

/// The public half of a keypair. Ordered and hashable so it can key maps
/// and be compared inside owner lists.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey {
    bytes: [u8; 32],
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; SIGNATURE_LENGTH],
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

impl Keypair {
    /// Generate a fresh keypair from the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed. In Ed25519 the seed *is*
    /// the secret key.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a base58-encoded secret key.
    pub fn from_secret_base58(text: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(text.trim())
            .into_vec()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Export the secret key as base58. Handle with care.
    pub fn secret_base58(&self) -> String {
        bs58::encode(self.signing_key.to_bytes()).into_string()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message. Deterministic for a given (key, message) pair.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Public half only.
        write!(f, "Keypair(pub={})", self.public_key())
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for Keypair {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

impl PublicKey {
    /// Wrap raw bytes after checking they decode to a curve point.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| KeyError::InvalidPublicKey("not a valid Ed25519 point".into()))?;
        Ok(Self { bytes })
    }

    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| {
            KeyError::InvalidPublicKey(format!("expected 32 bytes, got {}", slice.len()))
        })?;
        Self::from_bytes(bytes)
    }

    pub fn from_base58(text: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(text)
            .into_vec()
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        Self::try_from_slice(&bytes)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.bytes).into_string()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verify `signature` over `message`. Never panics; any malformed input
    /// simply fails verification.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let dalek_sig = DalekSignature::from_bytes(&signature.bytes);
        verifying_key.verify(message, &dalek_sig).is_ok()
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base58())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base58(&text).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self { bytes }
    }

    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        Some(Self {
            bytes: slice.try_into().ok()?,
        })
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        Self::try_from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        write!(f, "Signature({}...{})", &hex_str[..8], &hex_str[120..])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"hello");
        assert!(kp.public_key().verify(b"hello", &sig));
    }

    #[test]
    fn wrong_message_or_key_fails_verification() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let sig = kp.sign(b"hello");
        assert!(!kp.public_key().verify(b"hello!", &sig));
        assert!(!other.public_key().verify(b"hello", &sig));
    }

    #[test]
    fn deterministic_from_seed() {
        let a = Keypair::from_seed(&[7u8; 32]);
        let b = Keypair::from_seed(&[7u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.sign(b"m"), b.sign(b"m"));
    }

    #[test]
    fn secret_base58_roundtrip() {
        let kp = Keypair::generate();
        let restored = Keypair::from_secret_base58(&kp.secret_base58()).unwrap();
        assert_eq!(kp, restored);
    }

    #[test]
    fn secret_base58_rejects_wrong_length() {
        let short = bs58::encode([1u8; 16]).into_string();
        assert_eq!(
            Keypair::from_secret_base58(&short),
            Err(KeyError::InvalidSecretKey)
        );
    }

    #[test]
    fn public_key_base58_roundtrip() {
        let pk = Keypair::generate().public_key();
        let parsed: PublicKey = pk.to_base58().parse().unwrap();
        assert_eq!(pk, parsed);
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        assert!(matches!(
            PublicKey::try_from_slice(&[1u8; 31]),
            Err(KeyError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn public_key_serializes_as_base58_string() {
        let pk = Keypair::from_seed(&[3u8; 32]).public_key();
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{}\"", pk.to_base58()));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = Keypair::generate();
        let debug = format!("{:?}", kp);
        assert!(!debug.contains(&kp.secret_base58()));
    }
}
