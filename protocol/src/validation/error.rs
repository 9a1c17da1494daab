use thiserror::Error;
use uuid::Uuid;

use crate::storage::StoreError;
use crate::transaction::TransactionLink;

/// Why a transaction or block was turned away.
///
/// All variants except [`Store`](Self::Store) are rejections of a
/// well-formed submission: expected, user-visible, and final for that
/// exact transaction.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("transaction id {0} does not match its content")]
    InvalidHash(String),

    #[error("invalid operation: {0}")]
    OperationError(String),

    #[error("invalid value: {0}")]
    ValueError(String),

    #[error("transaction {0} does not exist")]
    TransactionDoesNotExist(String),

    #[error("input {input}: owners do not match the owners of {link}")]
    TransactionOwnerError { input: usize, link: TransactionLink },

    #[error("output {0} is already spent")]
    DoubleSpend(TransactionLink),

    #[error("input {0}: fulfillment does not satisfy its condition")]
    InvalidSignature(usize),

    #[error("asset id mismatch: expected {expected}, found {found}")]
    AssetIdMismatch { expected: Uuid, found: Uuid },

    #[error("invalid amount: {0}")]
    AmountError(String),

    #[error("transaction {0} is already committed")]
    DuplicateTransaction(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl ValidationError {
    /// `false` only for collaborator failures, which say nothing about the
    /// transaction itself.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, ValidationError::Store(_))
    }
}
