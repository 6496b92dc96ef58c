// chain/src/consensus/validator.rs

//! Block and attestation validation against the chain head.
//!
//! [`ChainValidator`] runs the checks that require chain context on top of
//! the block-local validation in [`Block::validate`]: slot succession,
//! predecessor linkage, chain-wide judgment uniqueness via the judgment
//! index, and (optionally) proposer membership. [`ValidatorRegistry`] is
//! the configured membership list mapping node ids to attester keys.

use std::collections::BTreeMap;

use crate::consensus::config::ConsensusConfig;
use crate::consensus::error::{ChainError, ValidationError};
use crate::hamt::HamtIndex;
use crate::storage::CidStore;
use crate::types::{Attestation, AttesterKey, Block, NodeId};

/// Configured validator membership: node id → attester key.
///
/// Keys are read-only configuration after startup; registration changes go
/// through the chain facade so observers see them.
#[derive(Clone, Debug, Default)]
pub struct ValidatorRegistry {
    keys: BTreeMap<NodeId, AttesterKey>,
}

impl ValidatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validator. Returns `false` if the id was already registered
    /// (the existing key is kept).
    pub fn register(&mut self, node_id: NodeId, key: AttesterKey) -> bool {
        use std::collections::btree_map::Entry;
        match self.keys.entry(node_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(key);
                true
            }
        }
    }

    /// Removes a validator. Returns `false` if the id was not registered.
    pub fn unregister(&mut self, node_id: &NodeId) -> bool {
        self.keys.remove(node_id).is_some()
    }

    /// The key registered for a node, if any.
    pub fn key_of(&self, node_id: &NodeId) -> Option<&AttesterKey> {
        self.keys.get(node_id)
    }

    /// Whether a node is registered.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.keys.contains_key(node_id)
    }

    /// Size of the registered set: the quorum denominator.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// `true` when no validator is registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Registered node ids, in sorted order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.keys.keys()
    }
}

/// Chain-context block validation.
#[derive(Clone, Debug)]
pub struct ChainValidator {
    max_judgments_per_block: usize,
    enforce_proposer_registry: bool,
}

impl ChainValidator {
    /// Constructs a validator from the consensus configuration.
    pub fn from_config(cfg: &ConsensusConfig) -> Self {
        Self {
            max_judgments_per_block: cfg.max_judgments_per_block,
            enforce_proposer_registry: cfg.enforce_proposer_registry,
        }
    }

    /// Validates a candidate block against the current head.
    ///
    /// On success the block may be appended; on failure the chain must be
    /// left untouched. Checks, in order: block-local validity, slot
    /// succession, predecessor hash, chain-wide judgment uniqueness,
    /// proposer membership (when enforced).
    pub fn validate_block<S: CidStore>(
        &self,
        block: &Block,
        head: &Block,
        judgment_index: &HamtIndex,
        store: &S,
        registry: &ValidatorRegistry,
    ) -> Result<(), ChainError> {
        let local = block.validate(self.max_judgments_per_block);
        if !local.is_valid() {
            return Err(ValidationError::Custom(local.errors.join("; ")).into());
        }

        let expected_slot = head.header.slot + 1;
        if block.header.slot != expected_slot {
            return Err(ChainError::SlotMismatch {
                expected: expected_slot,
                got: block.header.slot,
            });
        }

        let head_hash = head.hash();
        match &block.header.prev_hash {
            Some(prev) if *prev == head_hash => {}
            Some(prev) => {
                return Err(ChainError::PrevHashMismatch {
                    expected: head_hash.to_hex(),
                    got: prev.to_hex(),
                });
            }
            // Block::validate already ties a missing prev hash to slot 0,
            // and slot 0 never passes the succession check above.
            None => {
                return Err(ChainError::PrevHashMismatch {
                    expected: head_hash.to_hex(),
                    got: "null".to_string(),
                });
            }
        }

        for j in &block.judgments {
            if judgment_index.has(store, &j.id)? {
                return Err(ChainError::DuplicateJudgment(j.id.clone()));
            }
        }

        if self.enforce_proposer_registry && !registry.contains(&block.header.proposer) {
            return Err(ValidationError::Custom(format!(
                "proposer {:?} is not a registered validator",
                block.header.proposer.as_str()
            ))
            .into());
        }

        // Slot/hash consistency and intra-set dedup are part of the
        // block-local checks above; the MACs need the registry.
        for att in &block.attestations {
            if !self.verify_attestation(att, registry) {
                return Err(ValidationError::Custom(format!(
                    "attestation by {:?} does not verify",
                    att.node_id.as_str()
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Verifies an attestation against the attester's registered key.
    ///
    /// Unknown attesters and bad MACs both yield `false`; per the failure
    /// policy, rejected attestations are discarded without signal.
    pub fn verify_attestation(&self, att: &Attestation, registry: &ValidatorRegistry) -> bool {
        match registry.key_of(&att.node_id) {
            Some(key) => att.verify(key),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle;
    use crate::storage::MemoryCidStore;
    use crate::types::{Cid, HASH_LEN, Hash256, Header, JudgmentRef, Verdict};

    fn dummy_cid(byte: u8) -> Cid {
        Cid(Hash256([byte; HASH_LEN]))
    }

    fn judgment(id: &str, byte: u8) -> JudgmentRef {
        JudgmentRef::new(id, dummy_cid(byte), 80, Verdict::Wag)
    }

    fn child_of(head: &Block, judgments: Vec<JudgmentRef>) -> Block {
        let root = merkle::root(&judgments.iter().map(|j| j.cid).collect::<Vec<_>>());
        Block {
            header: Header {
                slot: head.header.slot + 1,
                timestamp_ms: head.header.timestamp_ms + 62,
                prev_hash: Some(head.hash()),
                judgments_root: root,
                proposer: NodeId::new("n1"),
            },
            judgments,
            attestations: Vec::new(),
            finalized: false,
        }
    }

    fn setup() -> (ChainValidator, ValidatorRegistry, MemoryCidStore, HamtIndex, Block) {
        let cfg = ConsensusConfig::default();
        let validator = ChainValidator::from_config(&cfg);
        let mut registry = ValidatorRegistry::new();
        registry.register(NodeId::new("n1"), AttesterKey::from_seed(b"n1"));
        let store = MemoryCidStore::new();
        let index = HamtIndex::new();
        let genesis = Block::genesis(NodeId::new("n1"), 0);
        (validator, registry, store, index, genesis)
    }

    #[test]
    fn accepts_a_well_linked_child() {
        let (validator, registry, store, index, genesis) = setup();
        let block = child_of(&genesis, vec![judgment("j1", 1)]);
        validator
            .validate_block(&block, &genesis, &index, &store, &registry)
            .expect("child should validate");
    }

    #[test]
    fn rejects_slot_gap() {
        let (validator, registry, store, index, genesis) = setup();
        let mut block = child_of(&genesis, vec![judgment("j1", 1)]);
        block.header.slot = 100;
        match validator.validate_block(&block, &genesis, &index, &store, &registry) {
            Err(ChainError::SlotMismatch { expected: 1, got: 100 }) => {}
            other => panic!("expected SlotMismatch, got {other:?}"),
        }
    }

    #[test]
    fn rejects_broken_linkage() {
        let (validator, registry, store, index, genesis) = setup();
        let mut block = child_of(&genesis, vec![judgment("j1", 1)]);
        block.header.prev_hash = Some(dummy_cid(0xEE));
        match validator.validate_block(&block, &genesis, &index, &store, &registry) {
            Err(ChainError::PrevHashMismatch { .. }) => {}
            other => panic!("expected PrevHashMismatch, got {other:?}"),
        }
    }

    #[test]
    fn rejects_judgment_already_on_chain() {
        let (validator, registry, mut store, mut index, genesis) = setup();
        index.set(&mut store, "j1", dummy_cid(7)).expect("index set");

        let block = child_of(&genesis, vec![judgment("j1", 1)]);
        match validator.validate_block(&block, &genesis, &index, &store, &registry) {
            Err(ChainError::DuplicateJudgment(id)) => assert_eq!(id, "j1"),
            other => panic!("expected DuplicateJudgment, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unregistered_proposer_when_enforced() {
        let (validator, _registry, store, index, genesis) = setup();
        let empty_registry = ValidatorRegistry::new();
        let block = child_of(&genesis, vec![judgment("j1", 1)]);
        match validator.validate_block(&block, &genesis, &index, &store, &empty_registry) {
            Err(ChainError::BlockInvalid(_)) => {}
            other => panic!("expected BlockInvalid, got {other:?}"),
        }
    }

    #[test]
    fn registry_enforcement_is_configurable() {
        let cfg = ConsensusConfig {
            enforce_proposer_registry: false,
            ..ConsensusConfig::default()
        };
        let validator = ChainValidator::from_config(&cfg);
        let (_, _, store, index, genesis) = setup();
        let block = child_of(&genesis, vec![judgment("j1", 1)]);
        validator
            .validate_block(&block, &genesis, &index, &store, &ValidatorRegistry::new())
            .expect("registry disabled, unknown proposer accepted");
    }

    #[test]
    fn attestation_verification_requires_a_registered_key() {
        let (validator, registry, _store, _index, genesis) = setup();
        let key = *registry.key_of(&NodeId::new("n1")).expect("n1 registered");
        let att = Attestation::sign(NodeId::new("n1"), 0, genesis.hash(), &key);
        assert!(validator.verify_attestation(&att, &registry));

        let stranger = Attestation::sign(
            NodeId::new("n9"),
            0,
            genesis.hash(),
            &AttesterKey::from_seed(b"n9"),
        );
        assert!(!validator.verify_attestation(&stranger, &registry));
    }

    #[test]
    fn rejects_a_block_carrying_a_forged_attestation() {
        let (validator, registry, store, index, genesis) = setup();
        let mut block = child_of(&genesis, vec![judgment("j1", 1)]);

        // MAC produced under the wrong key; slot and hash are correct so
        // block-local checks pass and the registry check must catch it.
        let forged = Attestation::sign(
            NodeId::new("n1"),
            block.header.slot,
            block.hash(),
            &AttesterKey::from_seed(b"not-n1s-key"),
        );
        block.attestations.push(forged);

        match validator.validate_block(&block, &genesis, &index, &store, &registry) {
            Err(ChainError::BlockInvalid(e)) => {
                assert!(e.to_string().contains("does not verify"), "got: {e}");
            }
            other => panic!("expected BlockInvalid, got {other:?}"),
        }
    }

    #[test]
    fn registry_register_unregister() {
        let mut registry = ValidatorRegistry::new();
        assert!(registry.register(NodeId::new("a"), AttesterKey::from_seed(b"a")));
        assert!(!registry.register(NodeId::new("a"), AttesterKey::from_seed(b"other")));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(&NodeId::new("a")));
        assert!(!registry.unregister(&NodeId::new("a")));
        assert!(registry.is_empty());
    }
}
