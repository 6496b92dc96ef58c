// chain/src/types/block.rs

//! Block types, canonical encoding, and hashing.
//!
//! This module defines the block structures of the Proof-of-Judgment chain,
//! together with the canonical hashing routine, attestation admission, and
//! block-local validation.
//!
//! Serialization is done with **bincode 2** using the `serde` integration
//! (`bincode::serde::encode_to_vec`) and an explicit `standard()` config.
//! The same canonical encoding is used everywhere we need block bytes.
//!
//! Two encodings exist on purpose:
//!
//! - the **core** encoding covers `(header, judgments)` only and is what the
//!   block hash (= CID) is computed over;
//! - the **envelope** encoding additionally carries the attestation set and
//!   the finalized flag and is what the store persists.
//!
//! Attestations and the finalized flag are mutable after creation, so they
//! must never feed the CID: absorbing a late attestation re-persists the
//! envelope under the same, unchanged CID.

use serde::{Deserialize, Serialize};

use super::{AttesterKey, Cid, Hash256, JudgmentRef, NodeId};
use crate::merkle;

/// Block header: minimal ordering and linkage fields.
///
/// Ordering is by `slot`; `timestamp_ms` is informational only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Header {
    /// Slot this block occupies. Exactly one block may occupy each slot.
    pub slot: u64,

    /// Wall-clock timestamp of block construction, in milliseconds since
    /// Unix epoch. Not used for ordering.
    pub timestamp_ms: u64,

    /// Hash of the predecessor block. `None` iff `slot == 0` (genesis).
    pub prev_hash: Option<Cid>,

    /// Merkle root over the CIDs of `judgments`, in list order.
    pub judgments_root: Cid,

    /// Node that proposed this block.
    pub proposer: NodeId,
}

/// A validator's signed statement that `block_hash` belongs at `slot`.
///
/// The signature is a keyed BLAKE3 MAC over the canonical attestation
/// payload. Two attestations are duplicates iff they agree on
/// `(node_id, slot, block_hash)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attestation {
    /// Attesting validator.
    pub node_id: NodeId,
    /// Slot the attested block occupies.
    pub slot: u64,
    /// Hash of the attested block.
    pub block_hash: Cid,
    /// `keyed_hash(node_key, node_id || slot || block_hash)`.
    pub signature: Hash256,
}

impl Attestation {
    /// Canonical MAC payload: `node_id || slot (big-endian) || block_hash`.
    fn payload(node_id: &NodeId, slot: u64, block_hash: &Cid) -> Vec<u8> {
        let mut buf = Vec::with_capacity(node_id.as_str().len() + 8 + super::HASH_LEN);
        buf.extend_from_slice(node_id.as_str().as_bytes());
        buf.extend_from_slice(&slot.to_be_bytes());
        buf.extend_from_slice(block_hash.as_hash().as_bytes());
        buf
    }

    /// Produces a signed attestation for `block_hash` at `slot`.
    pub fn sign(node_id: NodeId, slot: u64, block_hash: Cid, key: &AttesterKey) -> Self {
        let payload = Self::payload(&node_id, slot, &block_hash);
        let mac = blake3::keyed_hash(key.as_bytes(), &payload);
        Attestation {
            node_id,
            slot,
            block_hash,
            signature: Hash256(*mac.as_bytes()),
        }
    }

    /// Recomputes the MAC under `key` and compares it with the carried
    /// signature in constant time.
    pub fn verify(&self, key: &AttesterKey) -> bool {
        let payload = Self::payload(&self.node_id, self.slot, &self.block_hash);
        let expected = blake3::keyed_hash(key.as_bytes(), &payload);
        // blake3::Hash equality is constant-time.
        expected == self.signature.0
    }

    /// The identity under which duplicates are detected.
    pub fn dedup_key(&self) -> (&NodeId, u64, &Cid) {
        (&self.node_id, self.slot, &self.block_hash)
    }
}

/// Outcome of block-local validation: all violated invariants, not just the
/// first one.
#[derive(Clone, Debug, Default)]
pub struct BlockValidation {
    /// Human-readable descriptions of every violated invariant.
    pub errors: Vec<String>,
}

impl BlockValidation {
    /// `true` when no invariant was violated.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Block = header + ordered judgment refs + attestation set + finalized flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Header containing linkage, ordering, and proposer information.
    pub header: Header,
    /// Ordered list of judgment references included in this block.
    pub judgments: Vec<JudgmentRef>,
    /// Attestations absorbed so far. Semantically a set; kept in insertion
    /// order for byte-stable envelope encoding.
    pub attestations: Vec<Attestation>,
    /// Monotonic: once set, never cleared.
    pub finalized: bool,
}

impl Block {
    /// Constructs the genesis block: slot 0, no predecessor, no judgments,
    /// pre-finalized.
    pub fn genesis(proposer: NodeId, timestamp_ms: u64) -> Self {
        let header = Header {
            slot: 0,
            timestamp_ms,
            prev_hash: None,
            judgments_root: merkle::root(&[]),
            proposer,
        };
        Block {
            header,
            judgments: Vec::new(),
            attestations: Vec::new(),
            finalized: true,
        }
    }

    /// Returns the canonical **core** byte encoding: `(header, judgments)`.
    ///
    /// All hashing that depends on a "canonical" form goes through this
    /// method to avoid format drift. Attestations and the finalized flag are
    /// deliberately excluded.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming error,
    /// because all fields are required to be serializable.
    pub fn canonical_core_bytes(&self) -> Vec<u8> {
        // Explicit config to avoid relying on any implicit defaults.
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec((&self.header, &self.judgments), cfg)
            .expect("block core should always be serializable with bincode 2 + serde")
    }

    /// Computes the block's content identifier.
    ///
    /// This is the BLAKE3-256 digest of [`Block::canonical_core_bytes`] and
    /// is pure: absorbing attestations or finalizing the block leaves it
    /// unchanged. This must remain stable across nodes for attestation and
    /// inclusion-proof verification to work.
    pub fn hash(&self) -> Cid {
        Cid::from_bytes(&self.canonical_core_bytes())
    }

    /// Returns the **envelope** byte encoding persisted by the store:
    /// the full block including attestations and the finalized flag.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails, same as [`Block::canonical_core_bytes`].
    pub fn encode(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("block should always be serializable with bincode 2 + serde")
    }

    /// Decodes a block from its envelope encoding.
    pub fn decode(bytes: &[u8]) -> Result<Block, bincode::error::DecodeError> {
        let cfg = bincode::config::standard();
        let (block, _) = bincode::serde::decode_from_slice(bytes, cfg)?;
        Ok(block)
    }

    /// CIDs of the included judgments, in list order.
    pub fn judgment_cids(&self) -> Vec<Cid> {
        self.judgments.iter().map(|j| j.cid).collect()
    }

    /// Position of the judgment with the given id, if included.
    pub fn judgment_index(&self, id: &str) -> Option<usize> {
        self.judgments.iter().position(|j| j.id == id)
    }

    /// Absorbs an attestation, returning `true` if it was inserted.
    ///
    /// Admission requires `att.slot == header.slot`, `att.block_hash ==
    /// self.hash()`, a MAC that verifies under `key`, and no existing
    /// attestation with the same `(node_id, slot, block_hash)`. Anything
    /// else returns `false` and leaves the block untouched.
    pub fn add_attestation(&mut self, att: Attestation, key: &AttesterKey) -> bool {
        if att.slot != self.header.slot {
            return false;
        }
        if att.block_hash != self.hash() {
            return false;
        }
        if !att.verify(key) {
            return false;
        }
        if self
            .attestations
            .iter()
            .any(|existing| existing.dedup_key() == att.dedup_key())
        {
            return false;
        }
        self.attestations.push(att);
        true
    }

    /// Whether the absorbed attestations meet the quorum threshold for a
    /// validator set of the given size.
    ///
    /// Semantics are strictly "fraction of the configured validator set":
    /// offline validators still count against the denominator unless they
    /// are unregistered.
    pub fn has_quorum(&self, total_validators: usize, threshold: f64) -> bool {
        if total_validators == 0 {
            return false;
        }
        self.attestations.len() as f64 / total_validators as f64 >= threshold
    }

    /// Runs block-local validation: judgments-root consistency, the
    /// judgment-count cap, genesis self-consistency, judgment schema, and
    /// intra-block id uniqueness.
    ///
    /// Linkage against the chain head (slot succession, predecessor hash) is
    /// the chain validator's job, not the block's.
    pub fn validate(&self, max_judgments: usize) -> BlockValidation {
        let mut v = BlockValidation::default();

        match (self.header.slot, &self.header.prev_hash) {
            (0, Some(_)) => v.errors.push("genesis block must not carry a prev hash".into()),
            (s, None) if s != 0 => v
                .errors
                .push(format!("block at slot {s} is missing a prev hash")),
            _ => {}
        }

        let expected_root = merkle::root(&self.judgment_cids());
        if expected_root != self.header.judgments_root {
            v.errors.push(format!(
                "judgments root mismatch: header says {}, computed {}",
                self.header.judgments_root.to_hex(),
                expected_root.to_hex()
            ));
        }

        if self.judgments.len() > max_judgments {
            v.errors.push(format!(
                "block carries {} judgments, exceeds max_judgments_per_block={}",
                self.judgments.len(),
                max_judgments
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for j in &self.judgments {
            if !j.is_well_formed() {
                v.errors
                    .push(format!("malformed judgment record (id={:?})", j.id));
            }
            if !seen.insert(j.id.as_str()) {
                v.errors
                    .push(format!("duplicate judgment id {:?} within block", j.id));
            }
        }

        let own_hash = self.hash();
        let mut att_seen = std::collections::HashSet::new();
        for a in &self.attestations {
            if a.slot != self.header.slot {
                v.errors.push(format!(
                    "attestation by {:?} names slot {}, block occupies {}",
                    a.node_id.as_str(),
                    a.slot,
                    self.header.slot
                ));
            }
            if a.block_hash != own_hash {
                v.errors.push(format!(
                    "attestation by {:?} names a different block hash",
                    a.node_id.as_str()
                ));
            }
            if !att_seen.insert((a.node_id.clone(), a.slot, a.block_hash)) {
                v.errors.push(format!(
                    "duplicate attestation by {:?}",
                    a.node_id.as_str()
                ));
            }
        }

        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, Verdict};

    fn dummy_cid(byte: u8) -> Cid {
        Cid(Hash256([byte; HASH_LEN]))
    }

    fn dummy_judgment(id: &str, byte: u8) -> JudgmentRef {
        JudgmentRef::new(id, dummy_cid(byte), 72, Verdict::Wag)
    }

    fn block_with_judgments(slot: u64, judgments: Vec<JudgmentRef>) -> Block {
        let root = merkle::root(&judgments.iter().map(|j| j.cid).collect::<Vec<_>>());
        let header = Header {
            slot,
            timestamp_ms: 1_700_000_000_000,
            prev_hash: (slot > 0).then(|| dummy_cid(0)),
            judgments_root: root,
            proposer: NodeId::new("n1"),
        };
        Block {
            header,
            judgments,
            attestations: Vec::new(),
            finalized: false,
        }
    }

    #[test]
    fn block_hash_is_deterministic() {
        let block = block_with_judgments(1, vec![dummy_judgment("j1", 1)]);
        assert_eq!(block.hash(), block.hash());
    }

    #[test]
    fn hash_excludes_attestations_and_finalized_flag() {
        let mut block = block_with_judgments(1, vec![dummy_judgment("j1", 1)]);
        let before = block.hash();

        let key = AttesterKey::from_seed(b"n2-key");
        let att = Attestation::sign(NodeId::new("n2"), 1, before, &key);
        assert!(block.add_attestation(att, &key));
        block.finalized = true;

        assert_eq!(block.hash(), before);
    }

    #[test]
    fn envelope_roundtrip_preserves_hash_and_fields() {
        let mut block = block_with_judgments(1, vec![dummy_judgment("j1", 1), dummy_judgment("j2", 2)]);
        let key = AttesterKey::from_seed(b"n1-key");
        let att = Attestation::sign(NodeId::new("n1"), 1, block.hash(), &key);
        assert!(block.add_attestation(att, &key));

        let bytes = block.encode();
        let decoded = Block::decode(&bytes).expect("block decode");

        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.judgments.len(), 2);
        assert_eq!(decoded.attestations.len(), 1);
        assert_eq!(decoded.finalized, block.finalized);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Block::decode(&[0xff, 0x01, 0x02]).is_err());
    }

    #[test]
    fn attestation_admission_checks_slot_hash_and_signature() {
        let mut block = block_with_judgments(1, vec![dummy_judgment("j1", 1)]);
        let hash = block.hash();
        let key = AttesterKey::from_seed(b"n2-key");

        let wrong_slot = Attestation::sign(NodeId::new("n2"), 2, hash, &key);
        assert!(!block.add_attestation(wrong_slot, &key));

        let wrong_hash = Attestation::sign(NodeId::new("n2"), 1, dummy_cid(9), &key);
        assert!(!block.add_attestation(wrong_hash, &key));

        let other_key = AttesterKey::from_seed(b"imposter");
        let forged = Attestation::sign(NodeId::new("n2"), 1, hash, &other_key);
        assert!(!block.add_attestation(forged, &key));

        let good = Attestation::sign(NodeId::new("n2"), 1, hash, &key);
        assert!(block.add_attestation(good, &key));
        assert_eq!(block.attestations.len(), 1);
    }

    #[test]
    fn duplicate_attestations_are_rejected() {
        let mut block = block_with_judgments(1, vec![dummy_judgment("j1", 1)]);
        let hash = block.hash();
        let key = AttesterKey::from_seed(b"n2-key");

        let att = Attestation::sign(NodeId::new("n2"), 1, hash, &key);
        assert!(block.add_attestation(att.clone(), &key));
        assert!(!block.add_attestation(att, &key));
        assert_eq!(block.attestations.len(), 1);
    }

    #[test]
    fn quorum_uses_fraction_of_validator_set() {
        let mut block = block_with_judgments(1, vec![dummy_judgment("j1", 1)]);
        let hash = block.hash();

        for i in 0..3 {
            let key = AttesterKey::from_seed(format!("key-{i}").as_bytes());
            let att = Attestation::sign(NodeId::new(format!("n{i}")), 1, hash, &key);
            assert!(block.add_attestation(att, &key));
        }
        // 3/5 = 0.6 < 0.618
        assert!(!block.has_quorum(5, 0.618));

        let key = AttesterKey::from_seed(b"key-3");
        let att = Attestation::sign(NodeId::new("n3"), 1, hash, &key);
        assert!(block.add_attestation(att, &key));
        // 4/5 = 0.8 >= 0.618
        assert!(block.has_quorum(5, 0.618));

        assert!(!block.has_quorum(0, 0.618));
    }

    #[test]
    fn validate_catches_root_mismatch_and_overflow() {
        let mut block = block_with_judgments(1, vec![dummy_judgment("j1", 1)]);
        block.header.judgments_root = dummy_cid(0xEE);
        let v = block.validate(13);
        assert!(!v.is_valid());
        assert!(v.errors.iter().any(|e| e.contains("judgments root mismatch")));

        let many: Vec<_> = (0..3).map(|i| dummy_judgment(&format!("j{i}"), i)).collect();
        let block = block_with_judgments(1, many);
        let v = block.validate(2);
        assert!(v.errors.iter().any(|e| e.contains("exceeds max_judgments_per_block")));
    }

    #[test]
    fn validate_ties_prev_hash_to_genesis() {
        let mut genesis = Block::genesis(NodeId::new("n1"), 0);
        assert!(genesis.validate(13).is_valid());

        genesis.header.prev_hash = Some(dummy_cid(1));
        assert!(!genesis.validate(13).is_valid());

        let mut block = block_with_judgments(3, vec![dummy_judgment("j1", 1)]);
        block.header.prev_hash = None;
        let v = block.validate(13);
        assert!(v.errors.iter().any(|e| e.contains("missing a prev hash")));
    }

    #[test]
    fn validate_checks_carried_attestations() {
        let mut block = block_with_judgments(1, vec![dummy_judgment("j1", 1)]);
        let key = AttesterKey::from_seed(b"n2-key");

        // Bypass add_attestation to plant inconsistent entries.
        let mut wrong_slot = Attestation::sign(NodeId::new("n2"), 1, block.hash(), &key);
        wrong_slot.slot = 2;
        block.attestations.push(wrong_slot);

        let dup = Attestation::sign(NodeId::new("n3"), 1, block.hash(), &key);
        block.attestations.push(dup.clone());
        block.attestations.push(dup);

        let v = block.validate(13);
        assert!(v.errors.iter().any(|e| e.contains("names slot")));
        assert!(v.errors.iter().any(|e| e.contains("duplicate attestation")));
    }

    #[test]
    fn validate_catches_duplicate_ids_within_block() {
        let block = block_with_judgments(1, vec![dummy_judgment("j1", 1), dummy_judgment("j1", 2)]);
        let v = block.validate(13);
        assert!(v.errors.iter().any(|e| e.contains("duplicate judgment id")));
    }
}
