//! k-of-n composition of other conditions.
//!
//! ```text
//! payload = var_uint(threshold)
//!         ∥ var_uint(#fulfillments) ∥ (var_uint(1) ∥ fulfillment binary)*
//!         ∥ var_uint(#conditions)   ∥ (var_uint(1) ∥ condition binary)*
//! hash    = SHA-256(var_uint(0x04) ∥ var_uint(threshold) ∥ var_uint(n)
//!                   ∥ every child condition binary, shortest first)
//! ```
//!
//! The hash runs over the union of subconditions and the conditions of the
//! subfulfillments, so signing a branch never changes the fingerprint.
//! Children are ordered by encoded length with ties broken bytewise; both
//! the hash and the payload use this order. Equality ignores the order in
//! which children were added, so a parsed threshold compares equal to the
//! one that produced it whenever the payload kept every subfulfillment.
//!
//! Every child carries a weight of 1. Weighted quorums are built by
//! nesting thresholds instead.

use super::{Condition, ConditionError, Fulfillment, TYPE_THRESHOLD_SHA256};
use crate::codec::{var_uint_len, ByteSink, Hasher, Predictor, Reader};
use crate::config::MAX_THRESHOLD_DEPTH;

const WEIGHT: u64 = 1;

#[derive(Debug, Clone)]
pub struct ThresholdSha256 {
    threshold: u32,
    subconditions: Vec<Condition>,
    subfulfillments: Vec<Fulfillment>,
}

impl ThresholdSha256 {
    pub fn new(threshold: u32) -> Result<Self, ConditionError> {
        if threshold == 0 {
            return Err(ConditionError::InvalidField(
                "threshold must be at least 1".into(),
            ));
        }
        Ok(Self {
            threshold,
            subconditions: Vec::new(),
            subfulfillments: Vec::new(),
        })
    }

    pub fn with_subfulfillment(mut self, fulfillment: Fulfillment) -> Self {
        self.subfulfillments.push(fulfillment);
        self
    }

    pub fn with_subcondition(mut self, condition: Condition) -> Self {
        self.subconditions.push(condition);
        self
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn subconditions(&self) -> &[Condition] {
        &self.subconditions
    }

    pub fn subfulfillments(&self) -> &[Fulfillment] {
        &self.subfulfillments
    }

    /// Number of children, fulfilled or not.
    pub fn len(&self) -> usize {
        self.subconditions.len() + self.subfulfillments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Own bit OR'd with every descendant's.
    pub fn type_tag(&self) -> u32 {
        type_tag_of(&self.child_conditions())
    }

    /// Derive the condition, visiting each child once.
    pub fn condition(&self) -> Condition {
        let children = self.child_conditions();
        Condition::new(
            type_tag_of(&children),
            self.fingerprint_of(&children),
            self.max_fulfillment_length_of(&children),
        )
    }

    /// Levels of nested thresholds below and including this one.
    pub fn depth(&self) -> usize {
        1 + self
            .subfulfillments
            .iter()
            .map(Fulfillment::threshold_depth)
            .max()
            .unwrap_or(0)
    }

    fn child_conditions(&self) -> Vec<Condition> {
        self.subconditions
            .iter()
            .cloned()
            .chain(self.subfulfillments.iter().map(Fulfillment::condition))
            .collect()
    }

    pub fn fingerprint(&self) -> [u8; 32] {
        self.fingerprint_of(&self.child_conditions())
    }

    fn fingerprint_of(&self, children: &[Condition]) -> [u8; 32] {
        let mut encoded: Vec<Vec<u8>> = children.iter().map(Condition::serialize_binary).collect();
        sort_canonical(&mut encoded);

        let mut hasher = Hasher::new();
        hasher.write_var_uint(u64::from(TYPE_THRESHOLD_SHA256));
        hasher.write_var_uint(u64::from(self.threshold));
        hasher.write_var_uint(encoded.len() as u64);
        for bytes in &encoded {
            hasher.write_bytes(bytes);
        }
        hasher.finish()
    }

    /// Safe overestimate of the payload size.
    ///
    /// Assumes every child may appear as a condition and, on top of that,
    /// the `threshold` children with the largest fulfillments appear as
    /// fulfillments.
    pub fn max_fulfillment_length(&self) -> u64 {
        self.max_fulfillment_length_of(&self.child_conditions())
    }

    fn max_fulfillment_length_of(&self, children: &[Condition]) -> u64 {
        let total = children.len() as u64;

        let mut predictor = Predictor::new();
        predictor.write_var_uint(u64::from(self.threshold));
        predictor.write_var_uint(total);
        predictor.write_var_uint(total);
        for condition in children {
            predictor.write_var_uint(WEIGHT);
            condition.write_to(&mut predictor);
        }

        let mut largest: Vec<u64> = children
            .iter()
            .map(|c| {
                (var_uint_len(WEIGHT) as u64)
                    .saturating_add(var_uint_len(u64::from(c.type_tag())) as u64)
                    .saturating_add(c.max_fulfillment_length())
            })
            .collect();
        largest.sort_unstable_by(|a, b| b.cmp(a));
        let fulfillments: u64 = largest
            .iter()
            .take(self.threshold as usize)
            .fold(0u64, |acc, len| acc.saturating_add(*len));

        u64::try_from(predictor.size())
            .unwrap_or(u64::MAX)
            .saturating_add(fulfillments)
    }

    /// Keep the `threshold` cheapest serializable subfulfillments and write
    /// everything else as a bare condition.
    pub fn write_payload<S: ByteSink>(&self, sink: &mut S) -> Result<(), ConditionError> {
        let mut fulfilled: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut conditions: Vec<Vec<u8>> = self
            .subconditions
            .iter()
            .map(Condition::serialize_binary)
            .collect();

        for fulfillment in &self.subfulfillments {
            let condition = fulfillment.condition().serialize_binary();
            match fulfillment.serialize_binary() {
                Ok(encoded) => fulfilled.push((encoded, condition)),
                Err(_) => conditions.push(condition),
            }
        }

        let threshold = self.threshold as usize;
        if fulfilled.len() < threshold {
            return Err(ConditionError::ThresholdNotMet {
                threshold: self.threshold,
                available: fulfilled.len(),
            });
        }

        fulfilled.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
        let demoted = fulfilled.split_off(threshold);
        conditions.extend(demoted.into_iter().map(|(_, condition)| condition));
        sort_canonical(&mut conditions);

        sink.write_var_uint(u64::from(self.threshold));
        sink.write_var_uint(fulfilled.len() as u64);
        for (encoded, _) in &fulfilled {
            sink.write_var_uint(WEIGHT);
            sink.write_bytes(encoded);
        }
        sink.write_var_uint(conditions.len() as u64);
        for encoded in &conditions {
            sink.write_var_uint(WEIGHT);
            sink.write_bytes(encoded);
        }
        Ok(())
    }

    /// True iff at least `threshold` subfulfillments validate.
    pub fn validate(&self) -> bool {
        self.count_valid(Fulfillment::validate)
    }

    /// As [`validate`](Self::validate), with every signature checked
    /// against exactly `message`.
    pub fn validate_message(&self, message: &[u8]) -> bool {
        self.count_valid(|f| f.validate_message(message))
    }

    fn count_valid(&self, check: impl Fn(&Fulfillment) -> bool) -> bool {
        let valid = self.subfulfillments.iter().filter(|f| check(f)).count();
        valid >= self.threshold as usize
    }

    /// Rebuild with every subfulfillment replaced by `f(child)`.
    pub(super) fn try_map_subfulfillments<F>(&self, mut f: F) -> Result<Self, ConditionError>
    where
        F: FnMut(&Fulfillment) -> Result<Fulfillment, ConditionError>,
    {
        let subfulfillments = self
            .subfulfillments
            .iter()
            .map(&mut f)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            threshold: self.threshold,
            subconditions: self.subconditions.clone(),
            subfulfillments,
        })
    }
}

impl PartialEq for ThresholdSha256 {
    fn eq(&self, other: &Self) -> bool {
        self.threshold == other.threshold
            && same_children(&self.subconditions, &other.subconditions)
            && same_children(&self.subfulfillments, &other.subfulfillments)
    }
}

impl Eq for ThresholdSha256 {}

/// Multiset comparison: every child of `a` pairs off with a distinct equal
/// child of `b`.
fn same_children<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut unmatched: Vec<&T> = b.iter().collect();
    a.iter().all(|x| match unmatched.iter().position(|y| *y == x) {
        Some(i) => {
            unmatched.swap_remove(i);
            true
        }
        None => false,
    })
}

fn type_tag_of(children: &[Condition]) -> u32 {
    children
        .iter()
        .fold(TYPE_THRESHOLD_SHA256, |acc, c| acc | c.type_tag())
}

fn sort_canonical(encoded: &mut [Vec<u8>]) {
    encoded.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
}

fn read_weight(reader: &mut Reader<'_>) -> Result<(), ConditionError> {
    let weight = reader.read_var_uint()?;
    if weight != WEIGHT {
        return Err(ConditionError::InvalidField(format!(
            "unsupported weight {}",
            weight
        )));
    }
    Ok(())
}

pub(super) fn parse_payload(
    reader: &mut Reader<'_>,
    depth: usize,
) -> Result<Fulfillment, ConditionError> {
    if depth >= MAX_THRESHOLD_DEPTH {
        return Err(ConditionError::ThresholdTooDeep(MAX_THRESHOLD_DEPTH));
    }

    let threshold = u32::try_from(reader.read_var_uint()?)
        .map_err(|_| ConditionError::InvalidField("threshold out of range".into()))?;
    let mut node = ThresholdSha256::new(threshold)?;

    let fulfillment_count = reader.read_length()?;
    for _ in 0..fulfillment_count {
        read_weight(reader)?;
        node.subfulfillments
            .push(Fulfillment::read_at_depth(reader, depth + 1)?);
    }
    if node.subfulfillments.len() < threshold as usize {
        return Err(ConditionError::ThresholdNotMet {
            threshold,
            available: node.subfulfillments.len(),
        });
    }

    let condition_count = reader.read_length()?;
    for _ in 0..condition_count {
        read_weight(reader)?;
        node.subconditions.push(Condition::read_from(reader)?);
    }

    Ok(Fulfillment::Threshold(node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{Ed25519Sha256, PreimageSha256, TYPE_ED25519_SHA256};
    use crate::crypto::Keypair;

    const MSG: &[u8] = b"Hello World!";

    fn signed_leaf(seed: u8) -> Fulfillment {
        let kp = Keypair::from_seed(&[seed; 32]);
        Fulfillment::Ed25519(
            Ed25519Sha256::new(kp.public_key(), Vec::new(), 32)
                .sign(&kp, MSG)
                .unwrap(),
        )
    }

    fn unsigned_leaf(seed: u8) -> Fulfillment {
        let kp = Keypair::from_seed(&[seed; 32]);
        Fulfillment::Ed25519(Ed25519Sha256::new(kp.public_key(), Vec::new(), 32))
    }

    #[test]
    fn rejects_zero_threshold() {
        assert!(ThresholdSha256::new(0).is_err());
    }

    #[test]
    fn effective_type_tag_includes_children() {
        let t = ThresholdSha256::new(1)
            .unwrap()
            .with_subfulfillment(signed_leaf(1));
        assert_eq!(t.type_tag(), TYPE_THRESHOLD_SHA256 | TYPE_ED25519_SHA256);
    }

    #[test]
    fn validate_counts_only_valid_children() {
        let kp = Keypair::from_seed(&[9; 32]);
        let bad_sig = Ed25519Sha256::new(kp.public_key(), Vec::new(), 32)
            .with_signature(MSG.to_vec(), kp.sign(b"something else"));
        let t = ThresholdSha256::new(2)
            .unwrap()
            .with_subfulfillment(signed_leaf(1))
            .with_subfulfillment(Fulfillment::Ed25519(bad_sig));
        assert!(!t.validate());
    }

    #[test]
    fn fingerprint_is_independent_of_signatures_and_child_order() {
        let signed = ThresholdSha256::new(1)
            .unwrap()
            .with_subfulfillment(signed_leaf(1))
            .with_subfulfillment(unsigned_leaf(2));
        let unsigned = ThresholdSha256::new(1)
            .unwrap()
            .with_subcondition(unsigned_leaf(2).condition())
            .with_subfulfillment(unsigned_leaf(1));
        assert_eq!(signed.fingerprint(), unsigned.fingerprint());
        assert_eq!(
            signed.max_fulfillment_length(),
            unsigned.max_fulfillment_length()
        );
    }

    #[test]
    fn unsigned_children_are_written_as_conditions() {
        let t = ThresholdSha256::new(1)
            .unwrap()
            .with_subfulfillment(unsigned_leaf(1))
            .with_subfulfillment(signed_leaf(2));
        let uri = Fulfillment::Threshold(t.clone()).serialize_uri().unwrap();
        let Fulfillment::Threshold(parsed) = Fulfillment::from_uri(&uri).unwrap() else {
            panic!("expected threshold");
        };
        assert_eq!(parsed.subfulfillments().len(), 1);
        assert_eq!(parsed.subconditions(), &[unsigned_leaf(1).condition()]);
        assert_eq!(parsed.fingerprint(), t.fingerprint());
    }

    #[test]
    fn not_enough_fulfillments_is_an_error() {
        let t = ThresholdSha256::new(2)
            .unwrap()
            .with_subfulfillment(signed_leaf(1))
            .with_subfulfillment(unsigned_leaf(2));
        assert_eq!(
            Fulfillment::Threshold(t).serialize_uri(),
            Err(ConditionError::ThresholdNotMet {
                threshold: 2,
                available: 1
            })
        );
    }

    #[test]
    fn max_length_bounds_every_serialization() {
        let t = ThresholdSha256::new(2)
            .unwrap()
            .with_subfulfillment(signed_leaf(1))
            .with_subfulfillment(signed_leaf(2))
            .with_subfulfillment(Fulfillment::Preimage(PreimageSha256::new(vec![5u8; 40])));
        let payload = Fulfillment::Threshold(t.clone()).payload().unwrap();
        assert!((payload.len() as u64) <= t.max_fulfillment_length());
    }

    #[test]
    fn equality_ignores_child_order() {
        let preimage = Fulfillment::Preimage(PreimageSha256::new(b"open sesame".to_vec()));
        let t = ThresholdSha256::new(2)
            .unwrap()
            .with_subfulfillment(signed_leaf(1))
            .with_subfulfillment(preimage.clone());
        let swapped = ThresholdSha256::new(2)
            .unwrap()
            .with_subfulfillment(preimage)
            .with_subfulfillment(signed_leaf(1));
        assert_eq!(t, swapped);

        let f = Fulfillment::Threshold(t);
        assert_eq!(Fulfillment::from_uri(&f.serialize_uri().unwrap()).unwrap(), f);
        assert_eq!(
            Fulfillment::from_binary(&f.serialize_binary().unwrap()).unwrap(),
            f
        );
    }

    #[test]
    fn equality_counts_duplicate_children() {
        let twice = ThresholdSha256::new(1)
            .unwrap()
            .with_subfulfillment(signed_leaf(1))
            .with_subfulfillment(signed_leaf(1));
        let mixed = ThresholdSha256::new(1)
            .unwrap()
            .with_subfulfillment(signed_leaf(1))
            .with_subfulfillment(signed_leaf(2));
        assert_ne!(twice, mixed);
        assert_ne!(mixed, twice);
    }

    #[test]
    fn huge_child_bounds_saturate() {
        let hostile = Condition::new(1, [7; 32], u64::MAX);
        let t = ThresholdSha256::new(1)
            .unwrap()
            .with_subfulfillment(signed_leaf(1))
            .with_subcondition(hostile);
        let bytes = Fulfillment::Threshold(t).serialize_binary().unwrap();
        let parsed = Fulfillment::from_binary(&bytes).unwrap();
        assert_eq!(parsed.condition().max_fulfillment_length(), u64::MAX);
    }

    #[test]
    fn parse_rejects_excessive_nesting() {
        let mut node = Fulfillment::Preimage(PreimageSha256::new(b"x".to_vec()));
        for _ in 0..MAX_THRESHOLD_DEPTH + 1 {
            node = Fulfillment::Threshold(
                ThresholdSha256::new(1).unwrap().with_subfulfillment(node),
            );
        }
        let bytes = node.serialize_binary().unwrap();
        assert_eq!(
            Fulfillment::from_binary(&bytes),
            Err(ConditionError::ThresholdTooDeep(MAX_THRESHOLD_DEPTH))
        );
    }

    #[test]
    fn parse_rejects_non_unit_weight() {
        let leaf = Fulfillment::Preimage(PreimageSha256::new(b"x".to_vec()));
        let mut w = crate::codec::Writer::new();
        w.write_var_uint(u64::from(TYPE_THRESHOLD_SHA256));
        w.write_var_uint(1);
        w.write_var_uint(1);
        w.write_var_uint(2);
        w.write_bytes(&leaf.serialize_binary().unwrap());
        w.write_var_uint(0);
        assert!(matches!(
            Fulfillment::from_binary(w.as_bytes()),
            Err(ConditionError::InvalidField(_))
        ));
    }
}
