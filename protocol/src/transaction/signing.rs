//! Per-input signing.
//!
//! Each input signs [`Transaction::input_message`], a digest of the body
//! restricted to that one input. Signing never mutates: every signed input
//! is a new value built from the unsigned one, collected into a new
//! transaction with the same id.
//!
//! ```text
//! Ed25519 stub    owners_before[0] must have a key; sign the leaf
//! Threshold tree  every owner must have a key that signs ≥ 1 leaf
//! Preimage        already a complete proof; left as is
//! ```

use std::collections::HashMap;

use super::builder::Transaction;
use super::error::TransactionError;
use super::input::Input;
use crate::conditions::Fulfillment;
use crate::crypto::{Keypair, PublicKey};

/// Sign every input of `tx` with `private_keys`.
///
/// # Errors
///
/// [`TransactionError::KeypairMismatch`] when an owner has no key in
/// `private_keys`, or its key matches no leaf of the input's tree.
///
/// # Example
///
/// ```
/// use ccledger_protocol::crypto::Keypair;
/// use ccledger_protocol::transaction::{sign_transaction, Asset, Transaction};
///
/// let kp = Keypair::generate();
/// let pk = kp.public_key();
/// let tx = Transaction::create(&[pk], &[(vec![pk.into()], 1)], Asset::default(), None).unwrap();
/// let signed = sign_transaction(&tx, &[kp]).unwrap();
/// assert!(signed.is_signed());
/// assert_eq!(signed.id, tx.id);
/// ```
pub fn sign_transaction(
    tx: &Transaction,
    private_keys: &[Keypair],
) -> Result<Transaction, TransactionError> {
    sign_with(tx, private_keys, true)
}

/// Sign whatever `private_keys` can sign and leave the rest for co-signers.
pub fn sign_transaction_partial(
    tx: &Transaction,
    private_keys: &[Keypair],
) -> Result<Transaction, TransactionError> {
    sign_with(tx, private_keys, false)
}

fn sign_with(
    tx: &Transaction,
    private_keys: &[Keypair],
    strict: bool,
) -> Result<Transaction, TransactionError> {
    let keys: HashMap<PublicKey, &Keypair> =
        private_keys.iter().map(|k| (k.public_key(), k)).collect();

    let inputs = tx
        .inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let message = tx.input_message(index)?;
            sign_input(input, &message, &keys, strict)
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        txid = %tx.id,
        inputs = inputs.len(),
        strict,
        "transaction signed"
    );

    Ok(Transaction {
        inputs,
        ..tx.clone()
    })
}

fn sign_input(
    input: &Input,
    message: &[u8],
    keys: &HashMap<PublicKey, &Keypair>,
    strict: bool,
) -> Result<Input, TransactionError> {
    let fulfillment = match &input.fulfillment {
        Fulfillment::Preimage(_) => input.fulfillment.clone(),
        Fulfillment::Ed25519(leaf) => {
            let owner = input
                .owners_before
                .first()
                .ok_or_else(|| TransactionError::InvalidOwners("input has no owners".into()))?;
            if leaf.public_key() != owner {
                return Err(TransactionError::KeypairMismatch(*owner));
            }
            match keys.get(owner) {
                Some(keypair) => Fulfillment::Ed25519(leaf.sign(keypair, message)?),
                None if strict => return Err(TransactionError::KeypairMismatch(*owner)),
                None => input.fulfillment.clone(),
            }
        }
        Fulfillment::Threshold(_) => {
            let mut tree = input.fulfillment.clone();
            let mut seen: Vec<PublicKey> = Vec::new();
            for owner in &input.owners_before {
                if seen.contains(owner) {
                    continue;
                }
                seen.push(*owner);
                let Some(keypair) = keys.get(owner) else {
                    if strict {
                        return Err(TransactionError::KeypairMismatch(*owner));
                    }
                    continue;
                };
                let (signed, count) = tree.sign(keypair, message)?;
                if count == 0 {
                    return Err(TransactionError::KeypairMismatch(*owner));
                }
                tree = signed;
            }
            tree
        }
    };
    Ok(Input {
        fulfillment,
        ..input.clone()
    })
}

impl Transaction {
    /// See [`sign_transaction`].
    pub fn sign(&self, private_keys: &[Keypair]) -> Result<Transaction, TransactionError> {
        sign_transaction(self, private_keys)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
