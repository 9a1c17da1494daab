//! # LedgerDb: Persistent Storage Engine
//!
//! The on-disk [`TransactionStore`], built on sled's embedded key-value
//! store.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                    | Value                     |
//! |----------------|------------------------|---------------------------|
//! | `transactions` | `txid` (hex bytes)     | canonical JSON            |
//! | `spent`        | `txid:index` (UTF-8)   | spender `txid`            |
//! | `blocks`       | block `id` (hex bytes) | JSON `Block`              |
//!
//! ## Atomicity
//!
//! Committing runs as one sled transaction across the trees it touches:
//! the id-uniqueness check, the check that no spent output already has a
//! spender, and the writes. Either everything lands or nothing does.

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use super::block::Block;
use super::{checked, spent_key, StoreError, StoreResult, TransactionStore};
use crate::config::{TREE_BLOCKS, TREE_SPENT, TREE_TRANSACTIONS};
use crate::transaction::Transaction;

/// Persistent ledger storage.
///
/// sled trees support concurrent reads and serialized writes, so a
/// `LedgerDb` can be shared across threads via `Arc<LedgerDb>`.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    transactions: Tree,
    /// Spent index: `txid:index` -> id of the spending transaction.
    spent: Tree,
    blocks: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database cleaned up automatically when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let transactions = db.open_tree(TREE_TRANSACTIONS)?;
        let spent = db.open_tree(TREE_SPENT)?;
        let blocks = db.open_tree(TREE_BLOCKS)?;

        Ok(Self {
            db,
            transactions,
            spent,
            blocks,
        })
    }

    // -- Block operations ---------------------------------------------------

    /// Persist a block and every transaction in it atomically.
    ///
    /// Fails without writing anything if the block id or any transaction id
    /// is taken, or if any output spent in the block already has a spender
    /// (including another transaction of the same block).
    pub fn commit_block(&self, block: &Block) -> StoreResult<()> {
        let block_bytes = to_bytes(block)?;
        let staged = block
            .transactions()
            .iter()
            .map(|tx| Ok((tx, to_bytes(tx)?)))
            .collect::<StoreResult<Vec<_>>>()?;

        (&self.transactions, &self.spent, &self.blocks)
            .transaction(|(txs, spent, blocks)| {
                if blocks.get(block.id.as_bytes())?.is_some() {
                    return abort(StoreError::Duplicate(block.id.clone()));
                }
                for (tx, bytes) in &staged {
                    stage(txs, spent, tx, bytes)?;
                }
                blocks.insert(block.id.as_bytes(), block_bytes.as_slice())?;
                Ok(())
            })
            .map_err(unwrap_abort)?;

        self.db.flush()?;
        tracing::debug!(
            block = %block.id,
            transactions = block.transactions().len(),
            "block committed"
        );
        Ok(())
    }

    /// Retrieve a block by id, re-deriving the id on the way out.
    pub fn get_block(&self, id: &str) -> StoreResult<Option<Block>> {
        match self.blocks.get(id.as_bytes())? {
            Some(bytes) => {
                let block: Block = from_bytes(&bytes)?;
                if !block.verify_id() || block.id != id {
                    return Err(StoreError::Corrupt(id.to_string()));
                }
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    // -- Statistics ---------------------------------------------------------

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl TransactionStore for LedgerDb {
    fn get_transaction(&self, txid: &str) -> StoreResult<Option<Transaction>> {
        match self.transactions.get(txid.as_bytes())? {
            Some(bytes) => {
                let tx: Transaction = from_bytes(&bytes)?;
                if tx.id != txid {
                    return Err(StoreError::Corrupt(txid.to_string()));
                }
                checked(tx).map(Some)
            }
            None => Ok(None),
        }
    }

    fn get_spent(&self, txid: &str, output_index: u32) -> StoreResult<Option<Transaction>> {
        let key = spent_key(txid, output_index);
        match self.spent.get(key.as_bytes())? {
            Some(spender) => {
                let spender = std::str::from_utf8(&spender)
                    .map_err(|_| StoreError::Corrupt(key.clone()))?;
                match self.get_transaction(spender)? {
                    Some(tx) => Ok(Some(tx)),
                    // The index names a transaction that is not stored.
                    None => Err(StoreError::Corrupt(key)),
                }
            }
            None => Ok(None),
        }
    }

    fn store_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        let bytes = to_bytes(tx)?;
        (&self.transactions, &self.spent)
            .transaction(|(txs, spent)| stage(txs, spent, tx, &bytes))
            .map_err(unwrap_abort)?;
        tracing::debug!(txid = %tx.id, "transaction stored");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Check uniqueness and write one transaction plus its spent-index entries
/// inside a running sled transaction.
fn stage(
    txs: &TransactionalTree,
    spent: &TransactionalTree,
    tx: &Transaction,
    bytes: &[u8],
) -> ConflictableTransactionResult<(), StoreError> {
    if txs.get(tx.id.as_bytes())?.is_some() {
        return abort(StoreError::Duplicate(tx.id.clone()));
    }
    for link in tx.spent_outputs() {
        let key = spent_key(&link.txid, link.output_index);
        if let Some(spender) = spent.get(key.as_bytes())? {
            return abort(StoreError::AlreadySpent {
                link,
                spender: String::from_utf8_lossy(&spender).into_owned(),
            });
        }
        spent.insert(key.as_bytes(), tx.id.as_bytes())?;
    }
    txs.insert(tx.id.as_bytes(), bytes)?;
    Ok(())
}

fn abort<T>(err: StoreError) -> ConflictableTransactionResult<T, StoreError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn unwrap_abort(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => StoreError::Sled(err),
    }
}

fn to_bytes<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    // Through `Value` so object keys come out sorted.
    serde_json::to_value(value)
        .map(|v| v.to_string().into_bytes())
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_bytes<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::transaction::Asset;

    fn signed_create(kp: &Keypair) -> Transaction {
        let pk = kp.public_key();
        Transaction::create(&[pk], &[(vec![pk.into()], 1)], Asset::default(), None)
            .unwrap()
            .sign(&[kp.clone()])
            .unwrap()
    }

    fn signed_transfer(from: &Keypair, prev: &Transaction, to: &Keypair) -> Transaction {
        Transaction::transfer(
            prev.to_inputs(None).unwrap(),
            &[(vec![to.public_key().into()], 1)],
            prev.asset_id(),
            None,
        )
        .unwrap()
        .sign(&[from.clone()])
        .unwrap()
    }

    #[test]
    fn open_temporary_database() {
        let db = LedgerDb::open_temporary().unwrap();
        assert_eq!(db.transaction_count(), 0);
        assert_eq!(db.block_count(), 0);
    }

    #[test]
    fn open_persistent_database() {
        let dir = tempfile::tempdir().unwrap();
        let kp = Keypair::generate();
        let tx = signed_create(&kp);
        {
            let db = LedgerDb::open(dir.path().join("db")).unwrap();
            db.store_transaction(&tx).unwrap();
            db.flush().unwrap();
        }
        let db = LedgerDb::open(dir.path().join("db")).unwrap();
        assert_eq!(db.get_transaction(&tx.id).unwrap(), Some(tx));
    }

    #[test]
    fn store_and_retrieve_transaction() {
        let db = LedgerDb::open_temporary().unwrap();
        let tx = signed_create(&Keypair::generate());
        db.store_transaction(&tx).unwrap();
        assert_eq!(db.get_transaction(&tx.id).unwrap(), Some(tx));
        assert_eq!(db.get_transaction("00").unwrap(), None);
    }

    #[test]
    fn duplicate_transaction_is_rejected() {
        let db = LedgerDb::open_temporary().unwrap();
        let tx = signed_create(&Keypair::generate());
        db.store_transaction(&tx).unwrap();
        assert!(matches!(
            db.store_transaction(&tx),
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(db.transaction_count(), 1);
    }

    #[test]
    fn spent_index_and_conflicting_spend() {
        let alice = Keypair::generate();
        let db = LedgerDb::open_temporary().unwrap();
        let create = signed_create(&alice);
        db.store_transaction(&create).unwrap();
        assert_eq!(db.unspent_outputs(&create).unwrap().len(), 1);

        let first = signed_transfer(&alice, &create, &Keypair::generate());
        let second = signed_transfer(&alice, &create, &Keypair::generate());
        db.store_transaction(&first).unwrap();
        assert_eq!(db.get_spent(&create.id, 0).unwrap(), Some(first));
        assert!(db.unspent_outputs(&create).unwrap().is_empty());

        assert!(matches!(
            db.store_transaction(&second),
            Err(StoreError::AlreadySpent { .. })
        ));
        assert_eq!(db.get_transaction(&second.id).unwrap(), None);
    }

    #[test]
    fn tampered_record_is_reported_corrupt() {
        let db = LedgerDb::open_temporary().unwrap();
        let mut tx = signed_create(&Keypair::generate());
        db.store_transaction(&tx).unwrap();

        tx.outputs[0].amount = 5;
        db.transactions
            .insert(tx.id.as_bytes(), to_bytes(&tx).unwrap())
            .unwrap();
        assert!(matches!(
            db.get_transaction(&tx.id),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn commit_block_is_all_or_nothing() {
        let node = Keypair::generate();
        let alice = Keypair::generate();
        let db = LedgerDb::open_temporary().unwrap();
        let create = signed_create(&alice);
        let spend = signed_transfer(&alice, &create, &Keypair::generate());

        let block = Block::create(&node, vec![create.clone(), spend.clone()], vec![]).unwrap();
        db.commit_block(&block).unwrap();
        assert_eq!(db.get_block(&block.id).unwrap(), Some(block.clone()));
        assert_eq!(db.transaction_count(), 2);
        assert!(db.get_spent(&create.id, 0).unwrap().is_some());

        // A second block re-spending the same output writes nothing.
        let fresh = signed_create(&Keypair::generate());
        let respend = signed_transfer(&alice, &create, &Keypair::generate());
        let bad = Block::create(&node, vec![fresh.clone(), respend], vec![]).unwrap();
        assert!(matches!(
            db.commit_block(&bad),
            Err(StoreError::AlreadySpent { .. })
        ));
        assert_eq!(db.get_transaction(&fresh.id).unwrap(), None);
        assert_eq!(db.get_block(&bad.id).unwrap(), None);
        assert_eq!(db.block_count(), 1);
    }

    #[test]
    fn recommitting_a_block_is_rejected() {
        let node = Keypair::generate();
        let db = LedgerDb::open_temporary().unwrap();
        let block = Block::create(&node, vec![signed_create(&node)], vec![]).unwrap();
        db.commit_block(&block).unwrap();
        assert!(matches!(
            db.commit_block(&block),
            Err(StoreError::Duplicate(_))
        ));
    }
}
