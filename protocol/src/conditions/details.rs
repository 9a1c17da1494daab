//! JSON description of a fulfillment tree.
//!
//! Outputs publish it next to the condition URI so whoever spends the
//! output can rebuild the unsigned template, and partially signed inputs
//! travel in this form between co-signers. Preimages are secrets and never
//! appear here: a preimage node is rendered as its bare condition.

use serde::{Deserialize, Serialize};

use super::{Condition, ConditionError, Ed25519Sha256, Fulfillment, ThresholdSha256};
use crate::codec::{base64url_decode, base64url_encode};
use crate::config::MAX_THRESHOLD_DEPTH;
use crate::crypto::{PublicKey, Signature};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FulfillmentDetails {
    #[serde(rename = "ed25519-sha-256")]
    Ed25519 {
        public_key: PublicKey,
        /// base64url, unpadded.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        message_prefix: String,
        max_dynamic_message_length: u64,
        /// base64url, unpadded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<Signature>,
    },
    #[serde(rename = "threshold-sha-256")]
    Threshold {
        threshold: u32,
        subfulfillments: Vec<FulfillmentDetails>,
    },
    #[serde(rename = "condition")]
    Condition { uri: Condition },
}

impl FulfillmentDetails {
    /// Describe `fulfillment`, redacting preimages.
    pub fn from_fulfillment(fulfillment: &Fulfillment) -> Self {
        match fulfillment {
            Fulfillment::Preimage(_) => Self::Condition {
                uri: fulfillment.condition(),
            },
            Fulfillment::Ed25519(f) => {
                let signed = f.message().zip(f.signature());
                Self::Ed25519 {
                    public_key: *f.public_key(),
                    message_prefix: base64url_encode(f.message_prefix()),
                    max_dynamic_message_length: f.max_dynamic_message_length(),
                    message: signed.map(|(m, _)| base64url_encode(m)),
                    signature: signed.map(|(_, s)| *s),
                }
            }
            Fulfillment::Threshold(t) => {
                let subfulfillments = t
                    .subconditions()
                    .iter()
                    .map(|c| Self::Condition { uri: c.clone() })
                    .chain(t.subfulfillments().iter().map(Self::from_fulfillment))
                    .collect();
                Self::Threshold {
                    threshold: t.threshold(),
                    subfulfillments,
                }
            }
        }
    }

    /// The condition the described tree commits to.
    pub fn condition(&self) -> Result<Condition, ConditionError> {
        match self {
            Self::Condition { uri } => Ok(uri.clone()),
            _ => Ok(self.to_fulfillment()?.condition()),
        }
    }

    /// Rebuild the fulfillment template. The root must not be a bare
    /// condition.
    pub fn to_fulfillment(&self) -> Result<Fulfillment, ConditionError> {
        self.build(0)
    }

    fn build(&self, depth: usize) -> Result<Fulfillment, ConditionError> {
        match self {
            Self::Condition { .. } => Err(ConditionError::InvalidField(
                "a bare condition cannot be turned into a fulfillment".into(),
            )),
            Self::Ed25519 {
                public_key,
                message_prefix,
                max_dynamic_message_length,
                message,
                signature,
            } => {
                let prefix = base64url_decode(message_prefix)?;
                let mut leaf = Ed25519Sha256::new(*public_key, prefix, *max_dynamic_message_length);
                if let (Some(message), Some(signature)) = (message, signature) {
                    leaf = leaf.with_signature(base64url_decode(message)?, *signature);
                }
                Ok(Fulfillment::Ed25519(leaf))
            }
            Self::Threshold {
                threshold,
                subfulfillments,
            } => {
                if depth >= MAX_THRESHOLD_DEPTH {
                    return Err(ConditionError::ThresholdTooDeep(MAX_THRESHOLD_DEPTH));
                }
                let mut node = ThresholdSha256::new(*threshold)?;
                for child in subfulfillments {
                    node = match child {
                        Self::Condition { uri } => node.with_subcondition(uri.clone()),
                        _ => node.with_subfulfillment(child.build(depth + 1)?),
                    };
                }
                Ok(Fulfillment::Threshold(node))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::PreimageSha256;
    use crate::crypto::Keypair;

    fn leaf(kp: &Keypair) -> Fulfillment {
        Fulfillment::Ed25519(Ed25519Sha256::new(kp.public_key(), Vec::new(), 32))
    }

    #[test]
    fn unsigned_tree_survives_json() {
        let a = Keypair::from_seed(&[1; 32]);
        let b = Keypair::from_seed(&[2; 32]);
        let tree = Fulfillment::Threshold(
            ThresholdSha256::new(1)
                .unwrap()
                .with_subfulfillment(leaf(&a))
                .with_subfulfillment(leaf(&b)),
        );
        let details = FulfillmentDetails::from_fulfillment(&tree);
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["type"], "threshold-sha-256");
        assert_eq!(json["subfulfillments"][0]["public_key"], a.public_key().to_base58());

        let back: FulfillmentDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back.to_fulfillment().unwrap(), tree);
        assert_eq!(back.condition().unwrap(), tree.condition());
    }

    #[test]
    fn signed_leaf_keeps_message_and_signature() {
        let kp = Keypair::from_seed(&[3; 32]);
        let (signed, _) = leaf(&kp).sign(&kp, b"msg").unwrap();
        let details = FulfillmentDetails::from_fulfillment(&signed);
        assert_eq!(details.to_fulfillment().unwrap(), signed);
    }

    #[test]
    fn preimages_are_redacted() {
        let secret = Fulfillment::Preimage(PreimageSha256::new(b"hunter2".to_vec()));
        let details = FulfillmentDetails::from_fulfillment(&secret);
        let json = serde_json::to_string(&details).unwrap();
        assert!(!json.contains(&base64url_encode(b"hunter2")));
        assert_eq!(details.condition().unwrap(), secret.condition());
        assert!(details.to_fulfillment().is_err());
    }
}
