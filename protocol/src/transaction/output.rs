//! Outputs: a condition, who it belongs to, and how much it is worth.

use serde::{Deserialize, Serialize};

use super::error::TransactionError;
use crate::conditions::{
    Condition, ConditionError, Ed25519Sha256, Fulfillment, FulfillmentDetails, ThresholdSha256,
};
use crate::config::{MAX_AMOUNT, MAX_THRESHOLD_DEPTH, SIGNED_MESSAGE_LENGTH};
use crate::crypto::PublicKey;

// ---------------------------------------------------------------------------
// OwnerSpec
// ---------------------------------------------------------------------------

/// Shape of the owners of an output, as handed to [`Output::generate`].
///
/// ```text
/// [a]                      → ed25519(a)
/// [a, b]                   → 2-of-2(ed25519(a), ed25519(b))
/// [a, All[b, c]]           → 2-of-2(a, 2-of-2(b, c))
/// [Threshold(1, [a, b])]   → 1-of-2(a, b)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerSpec {
    Key(PublicKey),
    /// Every member must sign.
    All(Vec<OwnerSpec>),
    /// At least `k` members must sign.
    Threshold(u32, Vec<OwnerSpec>),
}

impl From<PublicKey> for OwnerSpec {
    fn from(key: PublicKey) -> Self {
        Self::Key(key)
    }
}

impl OwnerSpec {
    /// One plain key per owner.
    pub fn keys(keys: &[PublicKey]) -> Vec<OwnerSpec> {
        keys.iter().copied().map(OwnerSpec::Key).collect()
    }

    fn collect_keys(&self, out: &mut Vec<PublicKey>) {
        match self {
            Self::Key(k) => out.push(*k),
            Self::All(members) | Self::Threshold(_, members) => {
                for m in members {
                    m.collect_keys(out);
                }
            }
        }
    }

    fn build(&self, depth: usize) -> Result<Fulfillment, TransactionError> {
        match self {
            Self::Key(key) => Ok(key_leaf(*key)),
            Self::All(members) => group(members.len() as u32, members, depth),
            Self::Threshold(k, members) => group(*k, members, depth),
        }
    }
}

fn key_leaf(key: PublicKey) -> Fulfillment {
    Fulfillment::Ed25519(Ed25519Sha256::new(key, Vec::new(), SIGNED_MESSAGE_LENGTH))
}

fn group(threshold: u32, members: &[OwnerSpec], depth: usize) -> Result<Fulfillment, TransactionError> {
    if depth >= MAX_THRESHOLD_DEPTH {
        return Err(ConditionError::ThresholdTooDeep(MAX_THRESHOLD_DEPTH).into());
    }
    if members.len() < 2 {
        return Err(TransactionError::InvalidOwners(format!(
            "a sub-group needs at least two members, got {}",
            members.len()
        )));
    }
    if threshold == 0 || threshold as usize > members.len() {
        return Err(TransactionError::InvalidOwners(format!(
            "threshold {} out of range for {} members",
            threshold,
            members.len()
        )));
    }
    let mut node = ThresholdSha256::new(threshold)?;
    for member in members {
        node = node.with_subfulfillment(member.build(depth + 1)?);
    }
    Ok(Fulfillment::Threshold(node))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// The lock on an output: its condition plus, when known, the details tree
/// a spender needs to rebuild the fulfillment template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputCondition {
    pub uri: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<FulfillmentDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OutputRecord")]
pub struct Output {
    pub condition: OutputCondition,
    pub owners_after: Vec<PublicKey>,
    pub amount: u64,
}

#[derive(Deserialize)]
struct OutputRecord {
    condition: OutputCondition,
    owners_after: Vec<PublicKey>,
    amount: u64,
}

impl TryFrom<OutputRecord> for Output {
    type Error = TransactionError;

    fn try_from(record: OutputRecord) -> Result<Self, Self::Error> {
        if let Some(details) = &record.condition.details {
            if details.condition()? != record.condition.uri {
                return Err(TransactionError::DetailsMismatch(
                    record.condition.uri.serialize_uri(),
                ));
            }
        }
        Ok(Self {
            condition: record.condition,
            owners_after: record.owners_after,
            amount: record.amount,
        })
    }
}

impl Output {
    /// Build the condition tree for `owners_after`.
    ///
    /// A single plain key gives a bare Ed25519 condition; anything else
    /// becomes an N-of-N threshold over the top-level entries, with nested
    /// groups mirrored as nested thresholds.
    pub fn generate(owners_after: &[OwnerSpec], amount: u64) -> Result<Self, TransactionError> {
        check_amount(amount)?;
        let template = match owners_after {
            [] => return Err(TransactionError::InvalidOwners("no owners given".into())),
            [OwnerSpec::Key(key)] => key_leaf(*key),
            // A lone group at the top is the whole lock, not a sub-group.
            [only] => only.build(0)?,
            many => group(many.len() as u32, many, 0)?,
        };

        let mut keys = Vec::new();
        for spec in owners_after {
            spec.collect_keys(&mut keys);
        }
        Ok(Self::from_fulfillment(&template, keys, amount))
    }

    /// Lock an output with an arbitrary fulfillment template.
    pub fn from_fulfillment(template: &Fulfillment, owners_after: Vec<PublicKey>, amount: u64) -> Self {
        Self {
            condition: OutputCondition {
                uri: template.condition(),
                details: Some(FulfillmentDetails::from_fulfillment(template)),
            },
            owners_after,
            amount,
        }
    }

    /// Lock an output with a bare condition (no details published).
    pub fn from_condition(condition: Condition, owners_after: Vec<PublicKey>, amount: u64) -> Self {
        Self {
            condition: OutputCondition {
                uri: condition,
                details: None,
            },
            owners_after,
            amount,
        }
    }

    /// The unsigned template a spender signs, when details were published.
    pub fn fulfillment_template(&self) -> Option<Result<Fulfillment, TransactionError>> {
        self.condition
            .details
            .as_ref()
            .map(|d| d.to_fulfillment().map_err(TransactionError::from))
    }
}

pub(crate) fn check_amount(amount: u64) -> Result<(), TransactionError> {
    if amount == 0 || amount > MAX_AMOUNT {
        return Err(TransactionError::AmountOutOfRange(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{TYPE_ED25519_SHA256, TYPE_THRESHOLD_SHA256};
    use crate::crypto::Keypair;

    fn keys(n: u8) -> Vec<PublicKey> {
        (1..=n).map(|i| Keypair::from_seed(&[i; 32]).public_key()).collect()
    }

    #[test]
    fn single_key_gives_ed25519_condition() {
        let k = keys(1);
        let out = Output::generate(&OwnerSpec::keys(&k), 1).unwrap();
        assert_eq!(out.condition.uri.type_tag(), TYPE_ED25519_SHA256);
        assert_eq!(out.owners_after, k);
    }

    #[test]
    fn several_keys_give_n_of_n_threshold() {
        let k = keys(3);
        let out = Output::generate(&OwnerSpec::keys(&k), 5).unwrap();
        let Fulfillment::Threshold(t) = out.fulfillment_template().unwrap().unwrap() else {
            panic!("expected threshold");
        };
        assert_eq!(t.threshold(), 3);
        assert_eq!(t.subfulfillments().len(), 3);
        assert_eq!(
            out.condition.uri.type_tag(),
            TYPE_THRESHOLD_SHA256 | TYPE_ED25519_SHA256
        );
    }

    #[test]
    fn nested_groups_mirror_the_spec() {
        let k = keys(4);
        let spec = vec![
            OwnerSpec::Key(k[0]),
            OwnerSpec::Threshold(1, OwnerSpec::keys(&k[1..3])),
            OwnerSpec::All(vec![OwnerSpec::Key(k[3]), OwnerSpec::Key(k[0])]),
        ];
        let out = Output::generate(&spec, 1).unwrap();
        let template = out.fulfillment_template().unwrap().unwrap();
        assert_eq!(template.threshold_depth(), 2);
        assert_eq!(out.owners_after, vec![k[0], k[1], k[2], k[3], k[0]]);
    }

    #[test]
    fn lone_top_level_group_is_the_root() {
        let k = keys(2);
        let out = Output::generate(&[OwnerSpec::Threshold(1, OwnerSpec::keys(&k))], 1).unwrap();
        let Fulfillment::Threshold(t) = out.fulfillment_template().unwrap().unwrap() else {
            panic!("expected threshold");
        };
        assert_eq!(t.threshold(), 1);
        assert_eq!(t.subfulfillments().len(), 2);
    }

    #[test]
    fn one_member_sub_group_is_rejected() {
        let k = keys(2);
        let spec = vec![OwnerSpec::Key(k[0]), OwnerSpec::All(vec![OwnerSpec::Key(k[1])])];
        assert!(matches!(
            Output::generate(&spec, 1),
            Err(TransactionError::InvalidOwners(_))
        ));
    }

    #[test]
    fn bad_threshold_and_amounts_are_rejected() {
        let k = keys(2);
        let spec = vec![OwnerSpec::Threshold(3, OwnerSpec::keys(&k))];
        assert!(Output::generate(&spec, 1).is_err());
        assert!(Output::generate(&[], 1).is_err());
        assert!(matches!(
            Output::generate(&OwnerSpec::keys(&k[..1]), 0),
            Err(TransactionError::AmountOutOfRange(0))
        ));
        assert!(Output::generate(&OwnerSpec::keys(&k[..1]), MAX_AMOUNT + 1).is_err());
    }

    #[test]
    fn json_roundtrip_and_details_check() {
        let out = Output::generate(&OwnerSpec::keys(&keys(2)), 7).unwrap();
        let mut json = serde_json::to_value(&out).unwrap();
        assert_eq!(serde_json::from_value::<Output>(json.clone()).unwrap(), out);

        let other = Output::generate(&OwnerSpec::keys(&keys(1)), 7).unwrap();
        json["condition"]["uri"] = serde_json::to_value(&other.condition.uri).unwrap();
        assert!(serde_json::from_value::<Output>(json).is_err());
    }
}
