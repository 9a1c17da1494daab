//! Hashlock: the fulfillment is the preimage itself.

use super::{ConditionError, Fulfillment, TYPE_PREIMAGE_SHA256};
use crate::codec::{ByteSink, Predictor, Reader};
use crate::crypto::sha256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreimageSha256 {
    preimage: Vec<u8>,
}

impl PreimageSha256 {
    pub fn new(preimage: impl Into<Vec<u8>>) -> Self {
        Self {
            preimage: preimage.into(),
        }
    }

    pub fn preimage(&self) -> &[u8] {
        &self.preimage
    }

    pub fn type_tag(&self) -> u32 {
        TYPE_PREIMAGE_SHA256
    }

    /// The condition hash is over the raw preimage, not its encoding.
    pub fn fingerprint(&self) -> [u8; 32] {
        sha256(&self.preimage)
    }

    pub fn max_fulfillment_length(&self) -> u64 {
        let mut predictor = Predictor::new();
        self.write_payload(&mut predictor);
        predictor.size() as u64
    }

    pub fn write_payload<S: ByteSink>(&self, sink: &mut S) {
        sink.write_var_bytes(&self.preimage);
    }

    /// Knowing the preimage is the whole proof.
    pub fn validate(&self) -> bool {
        true
    }
}

pub(super) fn parse_payload(
    reader: &mut Reader<'_>,
    _depth: usize,
) -> Result<Fulfillment, ConditionError> {
    let preimage = reader.read_var_bytes()?;
    Ok(Fulfillment::Preimage(PreimageSha256::new(preimage)))
}
