//! Inputs: a fulfillment, the owners it speaks for, and the output it
//! spends.
//!
//! On the wire the `fulfillment` field is a `cf:` URI once the proof is
//! complete, the details tree while signatures are still missing, and
//! `null` inside the views that get hashed and signed.

use serde::{Deserialize, Serialize};

use super::error::TransactionError;
use super::types::TransactionLink;
use crate::conditions::{Fulfillment, FulfillmentDetails};
use crate::crypto::PublicKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "InputRecord", try_from = "InputRecord")]
pub struct Input {
    pub fulfillment: Fulfillment,
    pub owners_before: Vec<PublicKey>,
    /// `None` for CREATE and GENESIS inputs.
    pub link: Option<TransactionLink>,
}

#[derive(Serialize, Deserialize)]
struct InputRecord {
    fulfillment: Option<ProofRecord>,
    owners_before: Vec<PublicKey>,
    link: Option<TransactionLink>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ProofRecord {
    Uri(String),
    Details(FulfillmentDetails),
}

impl From<Input> for InputRecord {
    fn from(input: Input) -> Self {
        let proof = match input.fulfillment.serialize_uri() {
            Ok(uri) => ProofRecord::Uri(uri),
            Err(_) => ProofRecord::Details(FulfillmentDetails::from_fulfillment(&input.fulfillment)),
        };
        Self {
            fulfillment: Some(proof),
            owners_before: input.owners_before,
            link: input.link,
        }
    }
}

impl TryFrom<InputRecord> for Input {
    type Error = TransactionError;

    fn try_from(record: InputRecord) -> Result<Self, Self::Error> {
        let fulfillment = match record.fulfillment {
            Some(ProofRecord::Uri(uri)) => Fulfillment::from_uri(&uri)?,
            Some(ProofRecord::Details(details)) => details.to_fulfillment()?,
            None => return Err(TransactionError::MissingFulfillment),
        };
        Ok(Self {
            fulfillment,
            owners_before: record.owners_before,
            link: record.link,
        })
    }
}

impl Input {
    pub fn new(
        fulfillment: Fulfillment,
        owners_before: Vec<PublicKey>,
        link: Option<TransactionLink>,
    ) -> Self {
        Self {
            fulfillment,
            owners_before,
            link,
        }
    }

    /// Whether the proof is complete enough to serialize.
    pub fn is_signed(&self) -> bool {
        self.fulfillment.is_fulfilled()
    }
}
