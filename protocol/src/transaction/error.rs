//! Errors raised while building, signing or (de)serializing transactions.
//!
//! These are caller mistakes: fix the input and try again. Rejections of a
//! well-formed transaction live in [`crate::validation::ValidationError`].

use thiserror::Error;

use crate::conditions::ConditionError;
use crate::crypto::PublicKey;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("invalid owners: {0}")]
    InvalidOwners(String),

    #[error("amount {0} outside 1..=MAX_AMOUNT")]
    AmountOutOfRange(u64),

    #[error("transaction needs at least one {0}")]
    Empty(&'static str),

    #[error("no private key supplied for owner {0}, or it signs nothing in the input")]
    KeypairMismatch(PublicKey),

    #[error("transaction {txid} has no output {index}")]
    UnknownOutput { txid: String, index: usize },

    #[error("input index {0} out of range")]
    UnknownInput(usize),

    #[error("input carries no fulfillment")]
    MissingFulfillment,

    #[error("output {0} carries no condition details to build a fulfillment from")]
    MissingDetails(usize),

    #[error("condition details do not match condition {0}")]
    DetailsMismatch(String),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
