//! The closed fulfillment enum and its URI / binary forms.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use super::{
    lookup, Condition, ConditionError, Ed25519Sha256, PreimageSha256, ThresholdSha256,
};
use crate::codec::{base64url_decode, base64url_encode, ByteSink, Reader, Writer};
use crate::crypto::{Keypair, PublicKey};

static FULFILLMENT_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^cf:1:([1-9a-f][0-9a-f]{0,2}):([a-zA-Z0-9_-]+)$")
        .unwrap_or_else(|e| panic!("fulfillment URI pattern: {e}"))
});

/// A proof that satisfies a [`Condition`].
///
/// Thresholds own their children outright; the tree is built bottom-up
/// and replaced, never mutated, when a leaf gets signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfillment {
    Preimage(PreimageSha256),
    Ed25519(Ed25519Sha256),
    Threshold(ThresholdSha256),
}

impl Fulfillment {
    /// The single type bit of this variant, as written in fulfillment URIs.
    pub fn type_tag(&self) -> u32 {
        match self {
            Self::Preimage(f) => f.type_tag(),
            Self::Ed25519(f) => f.type_tag(),
            Self::Threshold(_) => super::TYPE_THRESHOLD_SHA256,
        }
    }

    /// Derive the condition this fulfillment satisfies. Pure: the same
    /// payload always yields the same condition.
    pub fn condition(&self) -> Condition {
        match self {
            Self::Preimage(f) => {
                Condition::new(f.type_tag(), f.fingerprint(), f.max_fulfillment_length())
            }
            Self::Ed25519(f) => {
                Condition::new(f.type_tag(), f.fingerprint(), f.max_fulfillment_length())
            }
            Self::Threshold(f) => f.condition(),
        }
    }

    pub fn write_payload<S: ByteSink>(&self, sink: &mut S) -> Result<(), ConditionError> {
        match self {
            Self::Preimage(f) => {
                f.write_payload(sink);
                Ok(())
            }
            Self::Ed25519(f) => f.write_payload(sink),
            Self::Threshold(f) => f.write_payload(sink),
        }
    }

    pub fn payload(&self) -> Result<Vec<u8>, ConditionError> {
        let mut writer = Writer::new();
        self.write_payload(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// `var_uint(type_tag) ∥ payload`.
    pub fn serialize_binary(&self) -> Result<Vec<u8>, ConditionError> {
        let mut writer = Writer::new();
        writer.write_var_uint(u64::from(self.type_tag()));
        self.write_payload(&mut writer)?;
        Ok(writer.into_bytes())
    }

    pub fn serialize_uri(&self) -> Result<String, ConditionError> {
        Ok(format!(
            "cf:1:{:x}:{}",
            self.type_tag(),
            base64url_encode(&self.payload()?)
        ))
    }

    pub fn from_uri(uri: &str) -> Result<Self, ConditionError> {
        let malformed = |reason: &str| ConditionError::MalformedUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };
        let caps = FULFILLMENT_URI
            .captures(uri)
            .ok_or_else(|| malformed("does not match cf:1:<tag>:<payload>"))?;
        let type_tag =
            u32::from_str_radix(&caps[1], 16).map_err(|_| malformed("bad type tag"))?;
        let registration = lookup(type_tag)?;

        let payload = base64url_decode(&caps[2])?;
        let mut reader = Reader::new(&payload);
        let fulfillment = (registration.parse)(&mut reader, 0)?;
        if !reader.is_exhausted() {
            return Err(ConditionError::TrailingBytes(reader.remaining()));
        }
        Ok(fulfillment)
    }

    /// Parse exactly one fulfillment from `bytes`.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, ConditionError> {
        let mut reader = Reader::new(bytes);
        let fulfillment = Self::read_from(&mut reader)?;
        if !reader.is_exhausted() {
            return Err(ConditionError::TrailingBytes(reader.remaining()));
        }
        Ok(fulfillment)
    }

    /// Parse one fulfillment from the reader's current position.
    pub fn read_from(reader: &mut Reader<'_>) -> Result<Self, ConditionError> {
        Self::read_at_depth(reader, 0)
    }

    pub(super) fn read_at_depth(
        reader: &mut Reader<'_>,
        depth: usize,
    ) -> Result<Self, ConditionError> {
        let tag = reader.read_var_uint()?;
        let type_tag = u32::try_from(tag).map_err(|_| ConditionError::UnsupportedType(u32::MAX))?;
        let registration = lookup(type_tag)?;
        (registration.parse)(reader, depth)
    }

    /// Validate with each signature checked against the message it carries.
    pub fn validate(&self) -> bool {
        match self {
            Self::Preimage(f) => f.validate(),
            Self::Ed25519(f) => f.validate(),
            Self::Threshold(f) => f.validate(),
        }
    }

    /// Validate with every signature required to be over exactly `message`.
    pub fn validate_message(&self, message: &[u8]) -> bool {
        match self {
            Self::Preimage(f) => f.validate(),
            Self::Ed25519(f) => f.validate_message(message),
            Self::Threshold(f) => f.validate_message(message),
        }
    }

    /// Whether this fulfillment unlocks `condition`: same condition, and a
    /// payload no longer than the condition allows.
    pub fn matches(&self, condition: &Condition) -> bool {
        if self.condition() != *condition {
            return false;
        }
        match self.payload() {
            Ok(payload) => payload.len() as u64 <= condition.max_fulfillment_length(),
            Err(_) => false,
        }
    }

    /// Can this fulfillment be serialized as it stands?
    pub fn is_fulfilled(&self) -> bool {
        self.payload().is_ok()
    }

    /// Every Ed25519 public key in the tree, depth first.
    pub fn public_keys(&self) -> Vec<PublicKey> {
        let mut keys = Vec::new();
        self.collect_public_keys(&mut keys);
        keys
    }

    fn collect_public_keys(&self, keys: &mut Vec<PublicKey>) {
        match self {
            Self::Preimage(_) => {}
            Self::Ed25519(f) => keys.push(*f.public_key()),
            Self::Threshold(t) => {
                for child in t.subfulfillments() {
                    child.collect_public_keys(keys);
                }
            }
        }
    }

    /// Nesting depth counted in thresholds; leaves are 0.
    pub fn threshold_depth(&self) -> usize {
        match self {
            Self::Threshold(t) => t.depth(),
            _ => 0,
        }
    }

    /// Sign every Ed25519 leaf belonging to `keypair` over `message`.
    ///
    /// Returns the rebuilt tree and how many leaves were signed; the
    /// original is left untouched.
    pub fn sign(&self, keypair: &Keypair, message: &[u8]) -> Result<(Self, usize), ConditionError> {
        let public_key = keypair.public_key();
        let mut signed = 0usize;
        let tree = self.sign_leaves(&public_key, keypair, message, &mut signed)?;
        Ok((tree, signed))
    }

    fn sign_leaves(
        &self,
        public_key: &PublicKey,
        keypair: &Keypair,
        message: &[u8],
        signed: &mut usize,
    ) -> Result<Self, ConditionError> {
        match self {
            Self::Ed25519(leaf) if leaf.public_key() == public_key => {
                *signed += 1;
                Ok(Self::Ed25519(leaf.sign(keypair, message)?))
            }
            Self::Threshold(t) => Ok(Self::Threshold(t.try_map_subfulfillments(|child| {
                child.sign_leaves(public_key, keypair, message, signed)
            })?)),
            other => Ok(other.clone()),
        }
    }
}

impl fmt::Display for Fulfillment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serialize_uri() {
            Ok(uri) => f.write_str(&uri),
            Err(_) => write!(f, "<unfulfilled {}>", self.condition()),
        }
    }
}
