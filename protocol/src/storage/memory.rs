//! In-memory [`TransactionStore`], for tests and embedding.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::{checked, spent_key, StoreError, StoreResult, TransactionStore};
use crate::transaction::Transaction;

#[derive(Debug, Default)]
struct Inner {
    transactions: HashMap<String, Transaction>,
    /// `txid:index` → id of the spender.
    spent: HashMap<String, String>,
}

/// Transactions and the spent index behind a single lock, so a commit's
/// uniqueness checks and writes are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionStore for MemoryStore {
    fn get_transaction(&self, txid: &str) -> StoreResult<Option<Transaction>> {
        let tx = self.inner.read().transactions.get(txid).cloned();
        tx.map(checked).transpose()
    }

    fn get_spent(&self, txid: &str, output_index: u32) -> StoreResult<Option<Transaction>> {
        let spender = self
            .inner
            .read()
            .spent
            .get(&spent_key(txid, output_index))
            .cloned();
        match spender {
            Some(id) => self.get_transaction(&id),
            None => Ok(None),
        }
    }

    fn store_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.transactions.contains_key(&tx.id) {
            return Err(StoreError::Duplicate(tx.id.clone()));
        }
        let links = tx.spent_outputs();
        for link in &links {
            if let Some(spender) = inner.spent.get(&spent_key(&link.txid, link.output_index)) {
                return Err(StoreError::AlreadySpent {
                    link: link.clone(),
                    spender: spender.clone(),
                });
            }
        }
        for link in links {
            inner
                .spent
                .insert(spent_key(&link.txid, link.output_index), tx.id.clone());
        }
        inner.transactions.insert(tx.id.clone(), tx.clone());
        Ok(())
    }
}
