//! # Block Structure
//!
//! A block is the unit in which a federation node commits transactions.
//!
//! ## Block Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  id: String        hex SHA-256 of `block`   │
//! ├─────────────────────────────────────────────┤
//! │  block: BlockBody                           │
//! │  ├── timestamp: u64                         │
//! │  ├── transactions: Vec<Transaction>         │
//! │  ├── node_pubkey: PublicKey                 │
//! │  └── voters: Vec<PublicKey>                 │
//! ├─────────────────────────────────────────────┤
//! │  signature: Signature   node key over `id`  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The id hashes the canonical JSON of the body; the signature is not
//! part of it (it signs the id, not the other way around).

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::crypto::{sha256_hex, Keypair, PublicKey, Signature};
use crate::transaction::Transaction;

/// Everything the block id commits to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBody {
    /// Unix seconds when the node assembled the block.
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    /// Key of the federation node that assembled and signed the block.
    pub node_pubkey: PublicKey,
    /// Federation members asked to vote on the block.
    pub voters: Vec<PublicKey>,
}

/// A signed batch of transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub block: BlockBody,
    pub signature: Option<Signature>,
}

impl Block {
    /// Assemble and sign a block with the node's key.
    pub fn create(
        node: &Keypair,
        transactions: Vec<Transaction>,
        voters: Vec<PublicKey>,
    ) -> Result<Self, serde_json::Error> {
        let body = BlockBody {
            timestamp: Utc::now().timestamp().max(0) as u64,
            transactions,
            node_pubkey: node.public_key(),
            voters,
        };
        let id = Self::hash_body(&body)?;
        let signature = node.sign(id.as_bytes());
        Ok(Self {
            id,
            block: body,
            signature: Some(signature),
        })
    }

    fn hash_body(body: &BlockBody) -> Result<String, serde_json::Error> {
        let canonical = serde_json::to_value(body)?.to_string();
        Ok(sha256_hex(canonical.as_bytes()))
    }

    pub fn compute_id(&self) -> Result<String, serde_json::Error> {
        Self::hash_body(&self.block)
    }

    pub fn verify_id(&self) -> bool {
        matches!(self.compute_id(), Ok(id) if id == self.id)
    }

    /// The node's signature over the id is present and valid.
    pub fn verify_signature(&self) -> bool {
        match &self.signature {
            Some(sig) => self.block.node_pubkey.verify(self.id.as_bytes(), sig),
            None => false,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.block.transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Asset;

    fn sample(node: &Keypair) -> Block {
        let pk = node.public_key();
        let tx = Transaction::create(&[pk], &[(vec![pk.into()], 1)], Asset::default(), None)
            .unwrap()
            .sign(&[node.clone()])
            .unwrap();
        Block::create(node, vec![tx], vec![pk]).unwrap()
    }

    #[test]
    fn created_block_verifies() {
        let node = Keypair::generate();
        let block = sample(&node);
        assert_eq!(block.id.len(), 64);
        assert!(block.verify_id());
        assert!(block.verify_signature());
        assert_eq!(block.transactions().len(), 1);
    }

    #[test]
    fn tampering_breaks_id() {
        let node = Keypair::generate();
        let mut block = sample(&node);
        block.block.voters.clear();
        assert!(!block.verify_id());
        // The signature still covers the stale id.
        assert!(block.verify_signature());
    }

    #[test]
    fn foreign_or_missing_signature_fails() {
        let node = Keypair::generate();
        let mut block = sample(&node);
        block.signature = Some(Keypair::generate().sign(block.id.as_bytes()));
        assert!(!block.verify_signature());
        block.signature = None;
        assert!(!block.verify_signature());
    }

    #[test]
    fn json_round_trip() {
        let block = sample(&Keypair::generate());
        let text = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&text).unwrap();
        assert_eq!(back, block);
        assert!(back.verify_id());
    }
}
