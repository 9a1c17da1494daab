//! The [`Transaction`] type and its factories.
//!
//! Factories build unsigned transactions whose `id` is already final:
//! the id hashes the canonical JSON body with every input's fulfillment
//! blanked, so signing later never changes it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::TransactionError;
use super::input::Input;
use super::output::{check_amount, Output, OwnerSpec};
use super::types::{Asset, Operation, TransactionLink};
use crate::conditions::{Ed25519Sha256, Fulfillment};
use crate::config::{SIGNED_MESSAGE_LENGTH, TRANSACTION_VERSION};
use crate::crypto::{sha256, sha256_hex, PublicKey};

/// Requested outputs: who owns each and for how much.
pub type OutputSpec = (Vec<OwnerSpec>, u64);

/// A ledger transaction.
///
/// # Canonical form
///
/// The wire form, the hashed form and the signed form are all the same
/// JSON: keys sorted, no insignificant whitespace. The id is
/// `hex(SHA-256(body))` where the body omits `id` and carries `null` for
/// every input's `fulfillment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub version: u32,
    /// Unix seconds at construction.
    pub timestamp: u64,
    pub operation: Operation,
    pub asset: Asset,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl Transaction {
    fn assemble(
        operation: Operation,
        asset: Asset,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self, TransactionError> {
        let mut tx = Self {
            id: String::new(),
            version: TRANSACTION_VERSION,
            timestamp: Utc::now().timestamp().max(0) as u64,
            operation,
            asset,
            inputs,
            outputs,
            metadata,
        };
        tx.id = tx.compute_id()?;
        Ok(tx)
    }

    fn build_outputs(outputs: &[OutputSpec]) -> Result<Vec<Output>, TransactionError> {
        if outputs.is_empty() {
            return Err(TransactionError::Empty("output"));
        }
        outputs
            .iter()
            .map(|(owners, amount)| Output::generate(owners, *amount))
            .collect()
    }

    /// An unsigned CREATE: one Ed25519 stub input per issuer, no links.
    pub fn create(
        owners_before: &[PublicKey],
        outputs: &[OutputSpec],
        asset: Asset,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self, TransactionError> {
        Self::issue(Operation::Create, owners_before, outputs, asset, metadata)
    }

    /// An unsigned GENESIS: `issuer` mints one unit of a fresh asset to
    /// itself.
    pub fn genesis(
        issuer: PublicKey,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self, TransactionError> {
        Self::issue(
            Operation::Genesis,
            &[issuer],
            &[(vec![OwnerSpec::Key(issuer)], 1)],
            Asset::new(None),
            metadata,
        )
    }

    fn issue(
        operation: Operation,
        owners_before: &[PublicKey],
        outputs: &[OutputSpec],
        asset: Asset,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self, TransactionError> {
        if owners_before.is_empty() {
            return Err(TransactionError::Empty("issuer"));
        }
        let inputs = owners_before
            .iter()
            .map(|key| {
                let stub = Ed25519Sha256::new(*key, Vec::new(), SIGNED_MESSAGE_LENGTH);
                Input::new(Fulfillment::Ed25519(stub), vec![*key], None)
            })
            .collect();
        let outputs = Self::build_outputs(outputs)?;
        Self::assemble(operation, asset, inputs, outputs, metadata)
    }

    /// An unsigned TRANSFER spending `inputs` (see [`to_inputs`](Self::to_inputs)).
    pub fn transfer(
        inputs: Vec<Input>,
        outputs: &[OutputSpec],
        asset_id: Uuid,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Self, TransactionError> {
        if inputs.is_empty() {
            return Err(TransactionError::Empty("input"));
        }
        if let Some(unlinked) = inputs.iter().position(|i| i.link.is_none()) {
            return Err(TransactionError::UnknownInput(unlinked));
        }
        let outputs = Self::build_outputs(outputs)?;
        Self::assemble(
            Operation::Transfer,
            Asset::reference(asset_id),
            inputs,
            outputs,
            metadata,
        )
    }

    /// Unsigned inputs spending the given outputs of this transaction, or
    /// all of them when `indices` is `None`.
    pub fn to_inputs(&self, indices: Option<&[usize]>) -> Result<Vec<Input>, TransactionError> {
        let all: Vec<usize> = (0..self.outputs.len()).collect();
        let indices = indices.unwrap_or(&all);
        indices
            .iter()
            .map(|&index| {
                let output = self.outputs.get(index).ok_or_else(|| {
                    TransactionError::UnknownOutput {
                        txid: self.id.clone(),
                        index,
                    }
                })?;
                let template = output
                    .fulfillment_template()
                    .ok_or(TransactionError::MissingDetails(index))??;
                Ok(Input::new(
                    template,
                    output.owners_after.clone(),
                    Some(TransactionLink::new(self.id.clone(), index as u32)),
                ))
            })
            .collect()
    }

    /// The outputs this transaction spends.
    pub fn spent_outputs(&self) -> Vec<TransactionLink> {
        self.inputs.iter().filter_map(|i| i.link.clone()).collect()
    }

    /// Id of the asset this transaction issues or moves.
    pub fn asset_id(&self) -> Uuid {
        self.asset.id
    }

    pub fn total_output_amount(&self) -> Result<u64, TransactionError> {
        self.outputs.iter().try_fold(0u64, |acc, o| {
            check_amount(o.amount)?;
            acc.checked_add(o.amount)
                .ok_or(TransactionError::AmountOutOfRange(o.amount))
        })
    }

    /// Every input carries a complete proof.
    pub fn is_signed(&self) -> bool {
        self.inputs.iter().all(Input::is_signed)
    }

    // -- canonical forms ----------------------------------------------------

    /// Full wire form, canonical JSON.
    pub fn to_json(&self) -> Result<String, TransactionError> {
        Ok(serde_json::to_value(self)?.to_string())
    }

    /// Parse the wire form. Does not check the id; see [`verify_id`](Self::verify_id).
    pub fn from_json(text: &str) -> Result<Self, TransactionError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The body with `id` removed and every fulfillment nulled.
    fn blanked_body(&self) -> Result<Map<String, Value>, TransactionError> {
        let Value::Object(mut body) = serde_json::to_value(self)? else {
            return Err(TransactionError::Serialization(serde::ser::Error::custom(
                "transaction did not serialize to an object",
            )));
        };
        body.remove("id");
        if let Some(Value::Array(inputs)) = body.get_mut("inputs") {
            for input in inputs {
                if let Value::Object(fields) = input {
                    fields.insert("fulfillment".into(), Value::Null);
                }
            }
        }
        Ok(body)
    }

    /// `hex(SHA-256(canonical body with proofs blanked))`.
    pub fn compute_id(&self) -> Result<String, TransactionError> {
        let body = Value::Object(self.blanked_body()?).to_string();
        Ok(sha256_hex(body.as_bytes()))
    }

    /// Whether the stored id matches the content.
    pub fn verify_id(&self) -> bool {
        matches!(self.compute_id(), Ok(id) if id == self.id)
    }

    /// The 32-byte digest input `index` signs.
    ///
    /// The view keeps every field of the body but replaces the input list
    /// with input `index` alone, fulfillment nulled, so no signature covers
    /// another input.
    pub fn input_message(&self, index: usize) -> Result<[u8; 32], TransactionError> {
        let mut body = self.blanked_body()?;
        let input = match body.get_mut("inputs") {
            Some(Value::Array(inputs)) if index < inputs.len() => inputs.swap_remove(index),
            _ => return Err(TransactionError::UnknownInput(index)),
        };
        body.insert("inputs".into(), Value::Array(vec![input]));
        Ok(sha256(Value::Object(body).to_string().as_bytes()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use serde_json::json;

    fn alice() -> Keypair {
        Keypair::from_seed(&[0xa1; 32])
    }

    fn bob() -> Keypair {
        Keypair::from_seed(&[0xb0; 32])
    }

    fn sample_create() -> Transaction {
        let a = alice().public_key();
        Transaction::create(&[a], &[(vec![a.into()], 1)], Asset::new(None), None).unwrap()
    }

    #[test]
    fn create_has_one_unlinked_stub_per_issuer() {
        let a = alice().public_key();
        let b = bob().public_key();
        let tx = Transaction::create(&[a, b], &[(vec![a.into()], 3)], Asset::new(None), None)
            .unwrap();
        assert_eq!(tx.operation, Operation::Create);
        assert_eq!(tx.inputs.len(), 2);
        assert!(tx.inputs.iter().all(|i| i.link.is_none()));
        assert_eq!(tx.inputs[1].owners_before, vec![b]);
        assert!(!tx.is_signed());
        assert_eq!(tx.total_output_amount().unwrap(), 3);
    }

    #[test]
    fn compute_id_matches_stored_id() {
        let tx = sample_create();
        assert_eq!(tx.id.len(), 64);
        assert_eq!(tx.compute_id().unwrap(), tx.id);
        assert!(tx.verify_id());
    }

    #[test]
    fn id_ignores_fulfillments_but_covers_everything_else() {
        let tx = sample_create();
        let signed = tx.sign(&[alice()]).unwrap();
        assert_eq!(signed.compute_id().unwrap(), tx.id);

        let mut tampered = tx.clone();
        tampered.outputs[0].amount = 2;
        assert!(!tampered.verify_id());

        let mut tampered = tx;
        tampered.metadata = Some(json!({"k": "v"}).as_object().unwrap().clone());
        assert!(!tampered.verify_id());
    }

    #[test]
    fn canonical_json_is_sorted_and_compact() {
        let tx = sample_create();
        let text = tx.to_json().unwrap();
        assert!(!text.contains(": "));
        assert!(!text.contains('\n'));
        let asset_pos = text.find("\"asset\"").unwrap();
        let id_pos = text.find("\"id\"").unwrap();
        let version_pos = text.find("\"version\"").unwrap();
        assert!(asset_pos < id_pos && id_pos < version_pos);

        let back = Transaction::from_json(&text).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.to_json().unwrap(), text);
    }

    #[test]
    fn transfer_requires_linked_inputs() {
        let tx = sample_create();
        let b = bob().public_key();
        let inputs = tx.to_inputs(None).unwrap();
        assert_eq!(inputs[0].link, Some(TransactionLink::new(tx.id.clone(), 0)));
        assert_eq!(inputs[0].owners_before, vec![alice().public_key()]);

        let transfer =
            Transaction::transfer(inputs, &[(vec![b.into()], 1)], tx.asset_id(), None).unwrap();
        assert_eq!(transfer.asset, Asset::reference(tx.asset_id()));
        assert_eq!(transfer.spent_outputs(), vec![TransactionLink::new(tx.id.clone(), 0)]);

        let unlinked = sample_create().inputs;
        assert!(matches!(
            Transaction::transfer(unlinked, &[(vec![b.into()], 1)], tx.asset_id(), None),
            Err(TransactionError::UnknownInput(0))
        ));
    }

    #[test]
    fn to_inputs_rejects_unknown_output() {
        let tx = sample_create();
        assert!(matches!(
            tx.to_inputs(Some(&[1])),
            Err(TransactionError::UnknownOutput { index: 1, .. })
        ));
    }

    #[test]
    fn input_messages_differ_per_input() {
        let a = alice().public_key();
        let b = bob().public_key();
        let tx = Transaction::create(&[a, b], &[(vec![a.into()], 1)], Asset::new(None), None)
            .unwrap();
        assert_ne!(tx.input_message(0).unwrap(), tx.input_message(1).unwrap());
        assert!(matches!(
            tx.input_message(2),
            Err(TransactionError::UnknownInput(2))
        ));
    }

    #[test]
    fn genesis_mints_one_unit_to_issuer() {
        let a = alice().public_key();
        let tx = Transaction::genesis(a, None).unwrap();
        assert_eq!(tx.operation, Operation::Genesis);
        assert_eq!(tx.outputs[0].owners_after, vec![a]);
        assert_eq!(tx.outputs[0].amount, 1);
    }

    #[test]
    fn empty_outputs_are_rejected() {
        let a = alice().public_key();
        assert!(matches!(
            Transaction::create(&[a], &[], Asset::new(None), None),
            Err(TransactionError::Empty("output"))
        ));
        assert!(matches!(
            Transaction::create(&[], &[(vec![a.into()], 1)], Asset::new(None), None),
            Err(TransactionError::Empty("issuer"))
        ));
    }
}
