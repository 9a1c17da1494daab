//! # Crypto-Conditions
//!
//! A *condition* locks an output; a *fulfillment* proves the right to
//! unlock it. The variant set is closed and fixed by protocol version:
//!
//! ```text
//! tag   name               proof
//! 0x01  preimage-sha-256   knowledge of a SHA-256 preimage
//! 0x04  threshold-sha-256  k valid children out of n (nests arbitrarily)
//! 0x08  ed25519-sha-256    an Ed25519 signature over prefix ∥ message
//! ```
//!
//! ## Wire forms
//!
//! ```text
//! condition URI     cc:1:<tag hex>:<base64url(hash)>:<max_fulfillment_length>
//! condition binary  var_uint(tag) ∥ var_bytes(hash) ∥ var_uint(max_fulfillment_length)
//! fulfillment URI   cf:1:<tag hex>:<base64url(payload)>
//! fulfillment bin   var_uint(tag) ∥ payload
//! ```
//!
//! A condition's tag is a bitmask: a threshold advertises the OR of its own
//! bit and every descendant's, so a verifier can tell from the condition
//! alone which algorithms it must support. A fulfillment's tag is always the
//! single bit of its own variant.
//!
//! Parsing goes through a static dispatch table ([`lookup`]) keyed by that
//! bit. There is no runtime registration.

pub mod condition;
pub mod details;
pub mod ed25519;
pub mod fulfillment;
pub mod preimage;
pub mod threshold;

pub use condition::Condition;
pub use details::FulfillmentDetails;
pub use ed25519::Ed25519Sha256;
pub use fulfillment::Fulfillment;
pub use preimage::PreimageSha256;
pub use threshold::ThresholdSha256;

use crate::codec::{CodecError, Reader};

pub const TYPE_PREIMAGE_SHA256: u32 = 0x01;
pub const TYPE_THRESHOLD_SHA256: u32 = 0x04;
pub const TYPE_ED25519_SHA256: u32 = 0x08;

/// Every bit a condition tag may carry in this protocol version.
pub const SUPPORTED_TYPES: u32 = TYPE_PREIMAGE_SHA256 | TYPE_THRESHOLD_SHA256 | TYPE_ED25519_SHA256;

/// Errors raised while parsing, building or serializing conditions and
/// fulfillments. These are *format* errors: the input is garbage, as
/// opposed to a well-formed proof that fails to verify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("malformed URI {uri:?}: {reason}")]
    MalformedUri { uri: String, reason: String },

    #[error("unsupported condition type {0:#x}")]
    UnsupportedType(u32),

    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("ed25519 fulfillment for {0} has no message or signature")]
    Unsigned(String),

    #[error("message of {len} bytes exceeds the declared bound of {max}")]
    MessageTooLong { len: usize, max: u64 },

    #[error("keypair does not match the fulfillment's public key")]
    KeypairMismatch,

    #[error("threshold of {threshold} not met: {available} subfulfillments available")]
    ThresholdNotMet { threshold: u32, available: usize },

    #[error("threshold tree deeper than {0} levels")]
    ThresholdTooDeep(usize),
}

/// Parser for one variant's payload. `depth` is the current threshold
/// nesting level.
pub type PayloadParser = fn(&mut Reader<'_>, usize) -> Result<Fulfillment, ConditionError>;

/// One row of the dispatch table.
pub struct Registration {
    pub type_tag: u32,
    pub name: &'static str,
    pub parse: PayloadParser,
}

static REGISTRY: [Registration; 3] = [
    Registration {
        type_tag: TYPE_PREIMAGE_SHA256,
        name: "preimage-sha-256",
        parse: preimage::parse_payload,
    },
    Registration {
        type_tag: TYPE_THRESHOLD_SHA256,
        name: "threshold-sha-256",
        parse: threshold::parse_payload,
    },
    Registration {
        type_tag: TYPE_ED25519_SHA256,
        name: "ed25519-sha-256",
        parse: ed25519::parse_payload,
    },
];

/// Find the variant registered for a fulfillment type tag.
pub fn lookup(type_tag: u32) -> Result<&'static Registration, ConditionError> {
    REGISTRY
        .iter()
        .find(|r| r.type_tag == type_tag)
        .ok_or(ConditionError::UnsupportedType(type_tag))
}

/// Check a condition bitmask against the supported set.
pub fn check_type_mask(type_tag: u32) -> Result<(), ConditionError> {
    if type_tag == 0 || type_tag & !SUPPORTED_TYPES != 0 {
        return Err(ConditionError::UnsupportedType(type_tag));
    }
    Ok(())
}
