//! # Storage Module
//!
//! The ledger's storage collaborator: what the validation engine reads
//! (`get_transaction`, `get_spent`) and what committing writes
//! (`store_transaction`).
//!
//! ## Architecture
//!
//! ```text
//! block.rs : Block: a signed, content-addressed batch of transactions
//! memory.rs: MemoryStore: HashMaps behind a parking_lot RwLock
//! db.rs    : LedgerDb: sled trees for transactions, spends and blocks
//! ```
//!
//! ## Uniqueness
//!
//! Validation only *detects* a double spend given a consistent read. The
//! stores close the race: committing checks, under one lock or one sled
//! transaction, that the id is new and that none of the outputs it spends
//! already has a spender. Of two conflicting transactions, exactly one
//! commits.

pub mod block;
pub mod db;
pub mod memory;

pub use block::{Block, BlockBody};
pub use db::LedgerDb;
pub use memory::MemoryStore;

use crate::transaction::{Transaction, TransactionLink};

/// Errors from a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction {0} is already stored")]
    Duplicate(String),

    #[error("output {link} is already spent by {spender}")]
    AlreadySpent {
        link: TransactionLink,
        spender: String,
    },

    #[error("stored record {0} failed its integrity check")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read and append access to committed transactions.
///
/// Implementations must re-derive the id of every transaction they return
/// and refuse to return one that does not match.
pub trait TransactionStore: Send + Sync {
    fn get_transaction(&self, txid: &str) -> StoreResult<Option<Transaction>>;

    /// The committed transaction that spends `txid:output_index`, if any.
    fn get_spent(&self, txid: &str, output_index: u32) -> StoreResult<Option<Transaction>>;

    /// Append `tx`. Fails if its id is taken or any output it spends
    /// already has a spender.
    fn store_transaction(&self, tx: &Transaction) -> StoreResult<()>;

    fn contains(&self, txid: &str) -> StoreResult<bool> {
        Ok(self.get_transaction(txid)?.is_some())
    }

    /// Outputs of committed transaction `tx` that nothing spends yet.
    fn unspent_outputs(&self, tx: &Transaction) -> StoreResult<Vec<TransactionLink>> {
        let mut unspent = Vec::new();
        for index in 0..tx.outputs.len() as u32 {
            if self.get_spent(&tx.id, index)?.is_none() {
                unspent.push(TransactionLink::new(tx.id.clone(), index));
            }
        }
        Ok(unspent)
    }
}

/// Key of the spent index: `<txid>:<output_index>`.
pub(crate) fn spent_key(txid: &str, output_index: u32) -> String {
    format!("{}:{}", txid, output_index)
}

/// Re-derive the id of a transaction read back from storage.
pub(crate) fn checked(tx: Transaction) -> StoreResult<Transaction> {
    if !tx.verify_id() {
        return Err(StoreError::Corrupt(tx.id));
    }
    Ok(tx)
}
