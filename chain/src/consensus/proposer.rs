// chain/src/consensus/proposer.rs

//! Block proposal logic.
//!
//! The producer assembles a candidate block on top of the current head from
//! a batch drained out of the pending-judgment pool, and self-attests it
//! before handing it to the chain for validation and ingest. Only nodes
//! configured as validators run a producer.

use crate::consensus::config::ConsensusConfig;
use crate::merkle;
use crate::pool::JudgmentPool;
use crate::types::{Attestation, AttesterKey, Block, Header, NodeId};

/// Slot-driven block producer for one validator node.
#[derive(Clone, Debug)]
pub struct Producer {
    node_id: NodeId,
    max_judgments_per_block: usize,
}

impl Producer {
    /// Constructs a producer from the consensus configuration.
    pub fn from_config(cfg: &ConsensusConfig, node_id: NodeId) -> Self {
        Self {
            node_id,
            max_judgments_per_block: cfg.max_judgments_per_block,
        }
    }

    /// The node this producer proposes as.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Drains the pool and builds a self-attested candidate on top of
    /// `head`. Returns `None` when nothing is pending (empty slots produce
    /// no block).
    ///
    /// The candidate is not validated or persisted here; the caller passes
    /// it to the chain for ingest and returns the batch to the pool if the
    /// chain rejects it.
    pub fn propose(
        &self,
        pool: &mut JudgmentPool,
        head: &Block,
        timestamp_ms: u64,
        key: &AttesterKey,
    ) -> Option<Block> {
        let judgments = pool.get_batch(self.max_judgments_per_block);
        if judgments.is_empty() {
            return None;
        }

        let judgments_root = merkle::root(&judgments.iter().map(|j| j.cid).collect::<Vec<_>>());
        let header = Header {
            slot: head.header.slot + 1,
            timestamp_ms,
            prev_hash: Some(head.hash()),
            judgments_root,
            proposer: self.node_id.clone(),
        };

        let mut block = Block {
            header,
            judgments,
            attestations: Vec::new(),
            finalized: false,
        };

        let slot = block.header.slot;
        let hash = block.hash();
        let self_attestation = Attestation::sign(self.node_id.clone(), slot, hash, key);
        // Cannot fail: slot and hash match by construction and the MAC was
        // just produced with the same key.
        block.add_attestation(self_attestation, key);

        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cid, HASH_LEN, Hash256, JudgmentRef, Verdict};

    fn judgment(id: &str, byte: u8) -> JudgmentRef {
        JudgmentRef::new(id, Cid(Hash256([byte; HASH_LEN])), 64, Verdict::Wag)
    }

    fn producer() -> (Producer, AttesterKey) {
        let cfg = ConsensusConfig::default();
        (
            Producer::from_config(&cfg, NodeId::new("n1")),
            AttesterKey::from_seed(b"n1"),
        )
    }

    #[test]
    fn empty_pool_produces_no_block() {
        let (producer, key) = producer();
        let mut pool = JudgmentPool::new(10);
        let genesis = Block::genesis(NodeId::new("n1"), 0);
        assert!(producer.propose(&mut pool, &genesis, 1, &key).is_none());
    }

    #[test]
    fn candidate_links_to_head_and_self_attests() {
        let (producer, key) = producer();
        let mut pool = JudgmentPool::new(10);
        pool.add(judgment("j1", 1));
        pool.add(judgment("j2", 2));

        let genesis = Block::genesis(NodeId::new("n1"), 0);
        let block = producer
            .propose(&mut pool, &genesis, 123, &key)
            .expect("non-empty pool proposes");

        assert_eq!(block.header.slot, 1);
        assert_eq!(block.header.prev_hash, Some(genesis.hash()));
        assert_eq!(block.header.timestamp_ms, 123);
        assert_eq!(block.judgments.len(), 2);
        assert_eq!(block.attestations.len(), 1);
        assert_eq!(block.attestations[0].node_id, NodeId::new("n1"));
        assert!(block.validate(13).is_valid());
        assert!(pool.is_empty());
    }

    #[test]
    fn drain_respects_the_per_block_cap() {
        let cfg = ConsensusConfig {
            max_judgments_per_block: 3,
            ..ConsensusConfig::default()
        };
        let producer = Producer::from_config(&cfg, NodeId::new("n1"));
        let key = AttesterKey::from_seed(b"n1");

        let mut pool = JudgmentPool::new(10);
        for i in 0..5 {
            pool.add(judgment(&format!("j{i}"), i));
        }

        let genesis = Block::genesis(NodeId::new("n1"), 0);
        let block = producer
            .propose(&mut pool, &genesis, 1, &key)
            .expect("proposes");

        assert_eq!(block.judgments.len(), 3);
        assert_eq!(pool.len(), 2);
        // Oldest first.
        assert_eq!(block.judgments[0].id, "j0");
    }
}
