//! Ed25519 signature fulfillment.
//!
//! ```text
//! payload = var_bytes(public_key)
//!         ∥ var_bytes(message_prefix)
//!         ∥ var_uint(max_dynamic_message_length)
//!         ∥ var_bytes(message)
//!         ∥ var_bytes(signature)
//! hash    = SHA-256(var_uint(tag) ∥ first three fields)
//! ```
//!
//! The message and signature stay out of the hash, so the condition is
//! known before anyone decides what will be signed.

use super::{ConditionError, Fulfillment, TYPE_ED25519_SHA256};
use crate::codec::{ByteSink, Hasher, Predictor, Reader};
use crate::crypto::{Keypair, PublicKey, Signature, SIGNATURE_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519Sha256 {
    public_key: PublicKey,
    message_prefix: Vec<u8>,
    max_dynamic_message_length: u64,
    message: Option<Vec<u8>>,
    signature: Option<Signature>,
}

impl Ed25519Sha256 {
    /// An unsigned fulfillment. `message_prefix` and the bound are fixed
    /// here because they are part of the condition.
    pub fn new(
        public_key: PublicKey,
        message_prefix: impl Into<Vec<u8>>,
        max_dynamic_message_length: u64,
    ) -> Self {
        Self {
            public_key,
            message_prefix: message_prefix.into(),
            max_dynamic_message_length,
            message: None,
            signature: None,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn message_prefix(&self) -> &[u8] {
        &self.message_prefix
    }

    pub fn max_dynamic_message_length(&self) -> u64 {
        self.max_dynamic_message_length
    }

    pub fn message(&self) -> Option<&[u8]> {
        self.message.as_deref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.message.is_some() && self.signature.is_some()
    }

    pub fn type_tag(&self) -> u32 {
        TYPE_ED25519_SHA256
    }

    /// Attach an externally produced message and signature.
    pub fn with_signature(mut self, message: impl Into<Vec<u8>>, signature: Signature) -> Self {
        self.message = Some(message.into());
        self.signature = Some(signature);
        self
    }

    /// Sign `message` with `keypair`, returning the signed fulfillment.
    pub fn sign(&self, keypair: &Keypair, message: &[u8]) -> Result<Self, ConditionError> {
        if keypair.public_key() != self.public_key {
            return Err(ConditionError::KeypairMismatch);
        }
        if message.len() as u64 > self.max_dynamic_message_length {
            return Err(ConditionError::MessageTooLong {
                len: message.len(),
                max: self.max_dynamic_message_length,
            });
        }
        let signature = keypair.sign(&self.signed_bytes(message));
        Ok(self.clone().with_signature(message.to_vec(), signature))
    }

    fn signed_bytes(&self, message: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.message_prefix.len() + message.len());
        bytes.extend_from_slice(&self.message_prefix);
        bytes.extend_from_slice(message);
        bytes
    }

    fn write_common_header<S: ByteSink>(&self, sink: &mut S) {
        sink.write_var_bytes(self.public_key.as_bytes());
        sink.write_var_bytes(&self.message_prefix);
        sink.write_var_uint(self.max_dynamic_message_length);
    }

    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Hasher::new();
        hasher.write_var_uint(u64::from(TYPE_ED25519_SHA256));
        self.write_common_header(&mut hasher);
        hasher.finish()
    }

    /// Header plus the largest message the bound allows plus a signature.
    pub fn max_fulfillment_length(&self) -> u64 {
        let mut predictor = Predictor::new();
        self.write_common_header(&mut predictor);
        predictor.write_var_uint(self.max_dynamic_message_length);
        predictor.skip(usize::try_from(self.max_dynamic_message_length).unwrap_or(usize::MAX));
        predictor.write_var_uint(SIGNATURE_LENGTH as u64);
        predictor.skip(SIGNATURE_LENGTH);
        u64::try_from(predictor.size()).unwrap_or(u64::MAX)
    }

    pub fn write_payload<S: ByteSink>(&self, sink: &mut S) -> Result<(), ConditionError> {
        let (Some(message), Some(signature)) = (&self.message, &self.signature) else {
            return Err(ConditionError::Unsigned(self.public_key.to_base58()));
        };
        self.write_common_header(sink);
        sink.write_var_bytes(message);
        sink.write_var_bytes(signature.as_bytes());
        Ok(())
    }

    /// Verify the stored signature over `message_prefix ∥ message`.
    /// Fails closed when either is missing or the message is over the bound.
    pub fn validate(&self) -> bool {
        let (Some(message), Some(signature)) = (&self.message, &self.signature) else {
            return false;
        };
        if message.len() as u64 > self.max_dynamic_message_length {
            return false;
        }
        self.public_key.verify(&self.signed_bytes(message), signature)
    }

    /// Whether this fulfillment is a valid signature over exactly `message`.
    pub fn validate_message(&self, message: &[u8]) -> bool {
        self.message.as_deref() == Some(message) && self.validate()
    }
}

pub(super) fn parse_payload(
    reader: &mut Reader<'_>,
    _depth: usize,
) -> Result<Fulfillment, ConditionError> {
    let public_key = PublicKey::try_from_slice(reader.read_var_bytes()?)
        .map_err(|e| ConditionError::InvalidField(e.to_string()))?;
    let message_prefix = reader.read_var_bytes()?.to_vec();
    let max_dynamic_message_length = reader.read_var_uint()?;
    let message = reader.read_var_bytes()?.to_vec();
    let signature = Signature::try_from_slice(reader.read_var_bytes()?).ok_or_else(|| {
        ConditionError::InvalidField(format!("signature must be {} bytes", SIGNATURE_LENGTH))
    })?;

    let fulfillment = Ed25519Sha256::new(public_key, message_prefix, max_dynamic_message_length)
        .with_signature(message, signature);
    Ok(Fulfillment::Ed25519(fulfillment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> Keypair {
        Keypair::from_seed(&[42u8; 32])
    }

    #[test]
    fn sign_and_validate() {
        let kp = keypair();
        let f = Ed25519Sha256::new(kp.public_key(), b"prefix:".to_vec(), 64)
            .sign(&kp, b"Hello World!")
            .unwrap();
        assert!(f.validate());
        assert!(f.validate_message(b"Hello World!"));
        assert!(!f.validate_message(b"Hello World!dummy"));
    }

    #[test]
    fn unsigned_fails_closed() {
        let f = Ed25519Sha256::new(keypair().public_key(), Vec::new(), 64);
        assert!(!f.validate());
        assert!(matches!(
            f.write_payload(&mut crate::codec::Writer::new()),
            Err(ConditionError::Unsigned(_))
        ));
    }

    #[test]
    fn sign_rejects_foreign_keypair() {
        let f = Ed25519Sha256::new(keypair().public_key(), Vec::new(), 64);
        assert_eq!(
            f.sign(&Keypair::generate(), b"m"),
            Err(ConditionError::KeypairMismatch)
        );
    }

    #[test]
    fn sign_enforces_message_bound() {
        let kp = keypair();
        let f = Ed25519Sha256::new(kp.public_key(), Vec::new(), 4);
        assert_eq!(
            f.sign(&kp, b"too long"),
            Err(ConditionError::MessageTooLong { len: 8, max: 4 })
        );
    }

    #[test]
    fn signature_from_other_message_does_not_verify() {
        let kp = keypair();
        let base = Ed25519Sha256::new(kp.public_key(), Vec::new(), 64);
        let signed_other = base.sign(&kp, b"other message").unwrap();
        let forged = base.with_signature(
            b"Hello World!".to_vec(),
            *signed_other.signature().unwrap(),
        );
        assert!(!forged.validate());
    }

    #[test]
    fn unbounded_message_length_saturates() {
        let kp = keypair();
        let f = Ed25519Sha256::new(kp.public_key(), Vec::new(), u64::MAX);
        let signed = f.sign(&kp, b"m").unwrap();
        let parsed = Fulfillment::from_binary(
            &Fulfillment::Ed25519(signed).serialize_binary().unwrap(),
        )
        .unwrap();
        assert_eq!(parsed.condition().max_fulfillment_length(), u64::MAX);
        assert!(!parsed.matches(&Fulfillment::Ed25519(
            Ed25519Sha256::new(kp.public_key(), Vec::new(), 64)
        )
        .condition()));
    }

    #[test]
    fn max_fulfillment_length_bounds_real_payload() {
        let kp = keypair();
        let unsigned = Ed25519Sha256::new(kp.public_key(), b"p".to_vec(), 32);
        let signed = unsigned.sign(&kp, &[9u8; 32]).unwrap();
        let mut predictor = Predictor::new();
        signed.write_payload(&mut predictor).unwrap();
        assert_eq!(predictor.size() as u64, unsigned.max_fulfillment_length());
    }
}
