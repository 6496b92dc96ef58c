// chain/src/consensus/finalizer.rs

//! Attestation-driven finalization.
//!
//! Whenever a block absorbs an attestation, the finalizer recomputes quorum
//! against the registered validator set and flips the block to finalized
//! once the threshold is met. Finalization is per-block and monotonic:
//! there is no rollback, and late attestations keep accumulating on an
//! already-finalized block.

use crate::consensus::config::ConsensusConfig;
use crate::types::Block;

/// Quorum tracker applying the configured threshold.
#[derive(Clone, Copy, Debug)]
pub struct Finalizer {
    quorum_threshold: f64,
}

impl Finalizer {
    /// Constructs a finalizer from the consensus configuration.
    pub fn from_config(cfg: &ConsensusConfig) -> Self {
        Self {
            quorum_threshold: cfg.quorum_threshold,
        }
    }

    /// The configured quorum threshold.
    pub fn quorum_threshold(&self) -> f64 {
        self.quorum_threshold
    }

    /// Re-evaluates quorum for `block` against a validator set of
    /// `total_validators`.
    ///
    /// Returns `true` only on the transition into the finalized state, so
    /// the caller emits exactly one finalization notification per block.
    pub fn on_attestation(&self, block: &mut Block, total_validators: usize) -> bool {
        if block.finalized {
            return false;
        }
        if block.has_quorum(total_validators, self.quorum_threshold) {
            block.finalized = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle;
    use crate::types::{
        Attestation, AttesterKey, Cid, HASH_LEN, Hash256, Header, JudgmentRef, NodeId, Verdict,
    };

    fn block_at_slot_one() -> Block {
        let judgments = vec![JudgmentRef::new(
            "j1",
            Cid(Hash256([1u8; HASH_LEN])),
            72,
            Verdict::Wag,
        )];
        let judgments_root = merkle::root(&[judgments[0].cid]);
        Block {
            header: Header {
                slot: 1,
                timestamp_ms: 0,
                prev_hash: Some(Cid(Hash256([0u8; HASH_LEN]))),
                judgments_root,
                proposer: NodeId::new("n0"),
            },
            judgments,
            attestations: Vec::new(),
            finalized: false,
        }
    }

    fn attest(block: &mut Block, i: usize) {
        let key = AttesterKey::from_seed(format!("key-{i}").as_bytes());
        let att = Attestation::sign(NodeId::new(format!("n{i}")), 1, block.hash(), &key);
        assert!(block.add_attestation(att, &key));
    }

    #[test]
    fn finalizes_exactly_at_quorum() {
        let finalizer = Finalizer::from_config(&ConsensusConfig::default());
        let mut block = block_at_slot_one();

        for i in 0..3 {
            attest(&mut block, i);
            // 1/5, 2/5, 3/5: all below 0.618.
            assert!(!finalizer.on_attestation(&mut block, 5));
            assert!(!block.finalized);
        }

        attest(&mut block, 3);
        // 4/5 = 0.8 crosses the threshold.
        assert!(finalizer.on_attestation(&mut block, 5));
        assert!(block.finalized);
    }

    #[test]
    fn transition_fires_only_once() {
        let finalizer = Finalizer::from_config(&ConsensusConfig::default());
        let mut block = block_at_slot_one();

        for i in 0..4 {
            attest(&mut block, i);
        }
        assert!(finalizer.on_attestation(&mut block, 5));

        // A late attestation is absorbed but does not re-fire finalization.
        attest(&mut block, 4);
        assert!(!finalizer.on_attestation(&mut block, 5));
        assert!(block.finalized);
        assert_eq!(block.attestations.len(), 5);
    }

    #[test]
    fn empty_validator_set_never_finalizes() {
        let finalizer = Finalizer::from_config(&ConsensusConfig::default());
        let mut block = block_at_slot_one();
        attest(&mut block, 0);
        assert!(!finalizer.on_attestation(&mut block, 0));
    }
}
