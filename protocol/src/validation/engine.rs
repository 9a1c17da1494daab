//! The per-transaction state machine and the block check.

use std::collections::BTreeSet;

use super::error::ValidationError;
use crate::config::TRANSACTION_VERSION;
use crate::crypto::PublicKey;
use crate::storage::{Block, StoreError, TransactionStore};
use crate::transaction::{Input, Output, OwnerSpec, Transaction, TransactionLink};

/// A spent output together with the committed transaction it belongs to.
struct Spent<'t> {
    link: &'t TransactionLink,
    prior: Transaction,
}

impl Spent<'_> {
    fn output(&self) -> &Output {
        // Existence is checked when the prior transaction is fetched.
        &self.prior.outputs[self.link.output_index as usize]
    }
}

/// Validates transactions and blocks against committed state.
///
/// The federation is the set of keys allowed to issue assets and to sign
/// blocks.
///
/// ```
/// use ccledger_protocol::crypto::Keypair;
/// use ccledger_protocol::storage::MemoryStore;
/// use ccledger_protocol::transaction::{Asset, Transaction};
/// use ccledger_protocol::validation::Validator;
///
/// let issuer = Keypair::generate();
/// let pk = issuer.public_key();
/// let federation = [pk];
/// let store = MemoryStore::new();
/// let validator = Validator::new(&store, &federation);
///
/// let tx = Transaction::create(&[pk], &[(vec![pk.into()], 1)], Asset::default(), None)
///     .unwrap()
///     .sign(&[issuer])
///     .unwrap();
/// assert_eq!(validator.validate_transaction(&tx).unwrap(), tx);
/// ```
pub struct Validator<'a, S: TransactionStore + ?Sized> {
    store: &'a S,
    federation: &'a [PublicKey],
}

impl<'a, S: TransactionStore + ?Sized> Validator<'a, S> {
    pub fn new(store: &'a S, federation: &'a [PublicKey]) -> Self {
        Self { store, federation }
    }

    /// Run every check; on success return the transaction unchanged.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<Transaction, ValidationError> {
        match self.check(tx) {
            Ok(()) => {
                tracing::debug!(txid = %tx.id, operation = %tx.operation, "transaction valid");
                Ok(tx.clone())
            }
            Err(err) => {
                if err.is_rejection() {
                    tracing::warn!(txid = %tx.id, reason = %err, "transaction rejected");
                } else {
                    tracing::error!(txid = %tx.id, error = %err, "validation aborted");
                }
                Err(err)
            }
        }
    }

    /// Validate, then commit through the store.
    ///
    /// A conflicting transaction committed between the two steps surfaces
    /// as the same rejection validation would have produced.
    pub fn submit(&self, tx: &Transaction) -> Result<Transaction, ValidationError> {
        let tx = self.validate_transaction(tx)?;
        match self.store.store_transaction(&tx) {
            Ok(()) => {
                tracing::info!(txid = %tx.id, "transaction committed");
                Ok(tx)
            }
            Err(StoreError::Duplicate(id)) => Err(ValidationError::DuplicateTransaction(id)),
            Err(StoreError::AlreadySpent { link, .. }) => Err(ValidationError::DoubleSpend(link)),
            Err(err) => Err(err.into()),
        }
    }

    /// Check a block and every transaction in it, stopping at the first
    /// failure.
    ///
    /// Transactions are checked against committed state only, so a block
    /// cannot spend an output created inside itself.
    pub fn validate_block(&self, block: &Block) -> Result<(), ValidationError> {
        if !block.verify_id() {
            return Err(ValidationError::InvalidBlock(format!(
                "id {} does not match its content",
                block.id
            )));
        }
        if !self.is_federation_member(&block.block.node_pubkey) {
            return Err(ValidationError::InvalidBlock(format!(
                "node {} is not a federation member",
                block.block.node_pubkey
            )));
        }
        if let Some(voter) = block
            .block
            .voters
            .iter()
            .find(|v| !self.is_federation_member(v))
        {
            return Err(ValidationError::InvalidBlock(format!(
                "voter {} is not a federation member",
                voter
            )));
        }
        if !block.verify_signature() {
            return Err(ValidationError::InvalidBlock(
                "node signature does not verify".into(),
            ));
        }

        let mut ids = BTreeSet::new();
        let mut spent = BTreeSet::new();
        for tx in block.transactions() {
            if !ids.insert(tx.id.as_str()) {
                return Err(ValidationError::DuplicateTransaction(tx.id.clone()));
            }
            for link in tx.spent_outputs() {
                if !spent.insert(link.clone()) {
                    return Err(ValidationError::DoubleSpend(link));
                }
            }
            self.validate_transaction(tx)?;
        }

        tracing::debug!(
            block = %block.id,
            transactions = block.transactions().len(),
            "block valid"
        );
        Ok(())
    }

    fn is_federation_member(&self, key: &PublicKey) -> bool {
        self.federation.contains(key)
    }

    // -- checks, in order ---------------------------------------------------

    fn check(&self, tx: &Transaction) -> Result<(), ValidationError> {
        if !tx.verify_id() {
            return Err(ValidationError::InvalidHash(tx.id.clone()));
        }
        if tx.version != TRANSACTION_VERSION {
            return Err(ValidationError::ValueError(format!(
                "unsupported transaction version {}",
                tx.version
            )));
        }
        if tx.outputs.is_empty() {
            return Err(ValidationError::ValueError("transaction has no outputs".into()));
        }

        if tx.operation.is_issuance() {
            self.check_issuance_structure(tx)?;
            self.check_issuance_proofs(tx)?;
            self.check_issuance_amounts(tx)?;
        } else {
            let links = Self::check_transfer_structure(tx)?;
            let spent = self.check_ownership(tx, &links)?;
            self.check_double_spend(tx, &links)?;
            Self::check_transfer_proofs(tx, &spent)?;
            Self::check_asset(tx, &spent)?;
            Self::check_transfer_amounts(tx, &spent)?;
        }

        if self.store.contains(&tx.id)? {
            return Err(ValidationError::DuplicateTransaction(tx.id.clone()));
        }
        Ok(())
    }

    fn check_issuance_structure(&self, tx: &Transaction) -> Result<(), ValidationError> {
        if tx.inputs.is_empty() {
            return Err(ValidationError::OperationError(format!(
                "{} needs at least one issuer input",
                tx.operation
            )));
        }
        for (index, input) in tx.inputs.iter().enumerate() {
            if input.link.is_some() {
                return Err(ValidationError::OperationError(format!(
                    "{} input {} links to a prior output",
                    tx.operation, index
                )));
            }
            if input.owners_before.is_empty() {
                return Err(ValidationError::OperationError(format!(
                    "{} input {} names no issuer",
                    tx.operation, index
                )));
            }
            if let Some(key) = input
                .owners_before
                .iter()
                .find(|k| !self.is_federation_member(k))
            {
                return Err(ValidationError::OperationError(format!(
                    "{} is not an authorized issuer",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Each issuer input must fulfill the lock its own owners would get.
    fn check_issuance_proofs(&self, tx: &Transaction) -> Result<(), ValidationError> {
        for (index, input) in tx.inputs.iter().enumerate() {
            let expected = Output::generate(&OwnerSpec::keys(&input.owners_before), 1)
                .map_err(|e| ValidationError::OperationError(e.to_string()))?;
            if input.fulfillment.condition() != expected.condition.uri {
                return Err(ValidationError::InvalidSignature(index));
            }
            Self::check_proof(tx, index, input)?;
        }
        Ok(())
    }

    fn check_issuance_amounts(&self, tx: &Transaction) -> Result<(), ValidationError> {
        tx.total_output_amount()
            .map_err(|e| ValidationError::AmountError(e.to_string()))?;
        if !tx.asset.divisible && (tx.outputs.len() != 1 || tx.outputs[0].amount != 1) {
            return Err(ValidationError::AmountError(
                "a non-divisible asset is issued as a single output of amount 1".into(),
            ));
        }
        Ok(())
    }

    fn check_transfer_structure(tx: &Transaction) -> Result<Vec<&TransactionLink>, ValidationError> {
        if tx.inputs.is_empty() {
            return Err(ValidationError::ValueError("TRANSFER has no inputs".into()));
        }
        tx.inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                input.link.as_ref().ok_or_else(|| {
                    ValidationError::ValueError(format!("TRANSFER input {} has no link", index))
                })
            })
            .collect()
    }

    fn check_ownership<'t>(
        &self,
        tx: &'t Transaction,
        links: &[&'t TransactionLink],
    ) -> Result<Vec<Spent<'t>>, ValidationError> {
        let mut spent = Vec::with_capacity(links.len());
        for (index, (input, &link)) in tx.inputs.iter().zip(links).enumerate() {
            let prior = self
                .store
                .get_transaction(&link.txid)?
                .ok_or_else(|| ValidationError::TransactionDoesNotExist(link.txid.clone()))?;
            let Some(output) = prior.outputs.get(link.output_index as usize) else {
                return Err(ValidationError::ValueError(format!(
                    "transaction {} has no output {}",
                    link.txid, link.output_index
                )));
            };
            if output.owners_after != input.owners_before {
                return Err(ValidationError::TransactionOwnerError {
                    input: index,
                    link: link.clone(),
                });
            }
            spent.push(Spent { link, prior });
        }
        Ok(spent)
    }

    fn check_double_spend(
        &self,
        tx: &Transaction,
        links: &[&TransactionLink],
    ) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        for &link in links {
            if !seen.insert(link) {
                return Err(ValidationError::DoubleSpend(link.clone()));
            }
            if let Some(spender) = self.store.get_spent(&link.txid, link.output_index)? {
                // A re-submission of the spender itself is caught as a duplicate.
                if spender.id != tx.id {
                    return Err(ValidationError::DoubleSpend(link.clone()));
                }
            }
        }
        Ok(())
    }

    fn check_transfer_proofs(tx: &Transaction, spent: &[Spent<'_>]) -> Result<(), ValidationError> {
        for (index, (input, s)) in tx.inputs.iter().zip(spent).enumerate() {
            if !input.fulfillment.matches(&s.output().condition.uri) {
                return Err(ValidationError::InvalidSignature(index));
            }
            Self::check_proof(tx, index, input)?;
        }
        Ok(())
    }

    fn check_proof(tx: &Transaction, index: usize, input: &Input) -> Result<(), ValidationError> {
        let message = tx
            .input_message(index)
            .map_err(|e| ValidationError::ValueError(e.to_string()))?;
        if !input.fulfillment.validate_message(&message) {
            return Err(ValidationError::InvalidSignature(index));
        }
        Ok(())
    }

    fn check_asset(tx: &Transaction, spent: &[Spent<'_>]) -> Result<(), ValidationError> {
        let expected = tx.asset_id();
        match spent.iter().find(|s| s.prior.asset_id() != expected) {
            Some(s) => Err(ValidationError::AssetIdMismatch {
                expected,
                found: s.prior.asset_id(),
            }),
            None => Ok(()),
        }
    }

    fn check_transfer_amounts(tx: &Transaction, spent: &[Spent<'_>]) -> Result<(), ValidationError> {
        let output_total = tx
            .total_output_amount()
            .map_err(|e| ValidationError::AmountError(e.to_string()))?;
        let input_total = spent
            .iter()
            .try_fold(0u64, |acc, s| acc.checked_add(s.output().amount))
            .ok_or_else(|| ValidationError::AmountError("input amounts overflow".into()))?;
        if input_total != output_total {
            return Err(ValidationError::AmountError(format!(
                "inputs carry {} but outputs carry {}",
                input_total, output_total
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
