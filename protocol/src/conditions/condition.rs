//! The condition: a fingerprint that locks an output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::{check_type_mask, ConditionError};
use crate::codec::{base64url_decode, base64url_encode, ByteSink, Reader, Writer};

static CONDITION_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^cc:1:([1-9a-f][0-9a-f]{0,2}):([a-zA-Z0-9_-]{43}):([1-9][0-9]{0,50})$")
        .unwrap_or_else(|e| panic!("condition URI pattern: {e}"))
});

/// `{type_tag, hash, max_fulfillment_length}`.
///
/// Derived from a fulfillment via [`Fulfillment::condition`](super::Fulfillment::condition)
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    type_tag: u32,
    hash: [u8; 32],
    max_fulfillment_length: u64,
}

impl Condition {
    pub fn new(type_tag: u32, hash: [u8; 32], max_fulfillment_length: u64) -> Self {
        Self {
            type_tag,
            hash,
            max_fulfillment_length,
        }
    }

    /// Bitmask of every variant the matching fulfillment may contain.
    pub fn type_tag(&self) -> u32 {
        self.type_tag
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Upper bound on the payload length of a matching fulfillment.
    pub fn max_fulfillment_length(&self) -> u64 {
        self.max_fulfillment_length
    }

    pub fn from_uri(uri: &str) -> Result<Self, ConditionError> {
        let malformed = |reason: &str| ConditionError::MalformedUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };
        let caps = CONDITION_URI
            .captures(uri)
            .ok_or_else(|| malformed("does not match cc:1:<tag>:<hash>:<length>"))?;

        let type_tag =
            u32::from_str_radix(&caps[1], 16).map_err(|_| malformed("bad type tag"))?;
        check_type_mask(type_tag)?;

        let hash: [u8; 32] = base64url_decode(&caps[2])?
            .as_slice()
            .try_into()
            .map_err(|_| malformed("hash is not 32 bytes"))?;
        let max_fulfillment_length: u64 = caps[3]
            .parse()
            .map_err(|_| malformed("max fulfillment length out of range"))?;

        Ok(Self::new(type_tag, hash, max_fulfillment_length))
    }

    pub fn serialize_uri(&self) -> String {
        format!(
            "cc:1:{:x}:{}:{}",
            self.type_tag,
            base64url_encode(&self.hash),
            self.max_fulfillment_length
        )
    }

    /// Parse exactly one condition from `bytes`.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, ConditionError> {
        let mut reader = Reader::new(bytes);
        let condition = Self::read_from(&mut reader)?;
        if !reader.is_exhausted() {
            return Err(ConditionError::TrailingBytes(reader.remaining()));
        }
        Ok(condition)
    }

    /// Parse one condition from the reader's current position.
    pub fn read_from(reader: &mut Reader<'_>) -> Result<Self, ConditionError> {
        let tag = reader.read_var_uint()?;
        let type_tag = u32::try_from(tag).map_err(|_| ConditionError::UnsupportedType(u32::MAX))?;
        check_type_mask(type_tag)?;

        let hash: [u8; 32] = reader
            .read_var_bytes()?
            .try_into()
            .map_err(|_| ConditionError::InvalidField("condition hash must be 32 bytes".into()))?;
        let max_fulfillment_length = reader.read_var_uint()?;
        if max_fulfillment_length == 0 {
            return Err(ConditionError::InvalidField(
                "max fulfillment length must be positive".into(),
            ));
        }
        Ok(Self::new(type_tag, hash, max_fulfillment_length))
    }

    pub fn write_to<S: ByteSink>(&self, sink: &mut S) {
        sink.write_var_uint(u64::from(self.type_tag));
        sink.write_var_bytes(&self.hash);
        sink.write_var_uint(self.max_fulfillment_length);
    }

    pub fn serialize_binary(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.write_to(&mut writer);
        writer.into_bytes()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize_uri())
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.serialize_uri())
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        Self::from_uri(&uri).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{TYPE_ED25519_SHA256, TYPE_PREIMAGE_SHA256, TYPE_THRESHOLD_SHA256};

    fn sample() -> Condition {
        Condition::new(TYPE_THRESHOLD_SHA256 | TYPE_ED25519_SHA256, [0xab; 32], 204)
    }

    #[test]
    fn uri_roundtrip() {
        let cond = sample();
        let uri = cond.serialize_uri();
        assert!(uri.starts_with("cc:1:c:"));
        assert!(uri.ends_with(":204"));
        assert_eq!(Condition::from_uri(&uri).unwrap(), cond);
    }

    #[test]
    fn binary_roundtrip() {
        let cond = sample();
        assert_eq!(Condition::from_binary(&cond.serialize_binary()).unwrap(), cond);
    }

    #[test]
    fn known_preimage_condition_uri() {
        // SHA-256 of the empty string, one byte of payload (var_bytes length 0).
        let hash = crate::crypto::sha256(b"");
        let cond = Condition::new(TYPE_PREIMAGE_SHA256, hash, 1);
        assert_eq!(
            cond.serialize_uri(),
            "cc:1:1:47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU:1"
        );
    }

    #[test]
    fn rejects_malformed_uris() {
        let good = sample().serialize_uri();
        let bad_uris = vec![
            String::new(),
            "cc:2:c:AAAA:1".to_string(),
            good.replace("cc:1", "cf:1"),
            good.replace(":204", ":0"),
            good.replace(":204", ":0204"),
            format!("{}x", good),
            good.replacen(":c:", ":0c:", 1),
        ];
        for bad in &bad_uris {
            assert!(
                matches!(Condition::from_uri(bad), Err(ConditionError::MalformedUri { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn rejects_unknown_type_bits() {
        let uri = sample().serialize_uri().replacen(":c:", ":10:", 1);
        assert_eq!(
            Condition::from_uri(&uri),
            Err(ConditionError::UnsupportedType(0x10))
        );
    }

    #[test]
    fn rejects_trailing_binary() {
        let mut bytes = sample().serialize_binary();
        bytes.push(0);
        assert_eq!(
            Condition::from_binary(&bytes),
            Err(ConditionError::TrailingBytes(1))
        );
    }

    #[test]
    fn serde_uses_uri_string() {
        let cond = sample();
        let json = serde_json::to_string(&cond).unwrap();
        assert_eq!(json, format!("\"{}\"", cond.serialize_uri()));
        assert_eq!(serde_json::from_str::<Condition>(&json).unwrap(), cond);
    }
}
