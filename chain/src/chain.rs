// chain/src/chain.rs

//! Chain facade.
//!
//! [`Chain`] wires together the content-addressed store, the three HAMT
//! indices, the pending-judgment pool, the producer, the validator, and the
//! finalizer into the public ledger API: init, block ingest, attestation
//! ingest, lookups, range queries, integrity verification, inclusion
//! proofs, stats, and export.
//!
//! The chain is a single logical actor: all `&mut self` operations must be
//! externally serialized (the node wraps the chain in one async mutex).
//! Reads against a captured set of index roots are snapshot-consistent
//! thanks to HAMT structural sharing.
//!
//! Durability model: blocks and index nodes are content-addressed blobs;
//! the mutable tip of the world is one metadata record ([`ChainMeta`])
//! holding the head, the finalized slot, and the three index roots. The
//! record is written only after every blob and sub-index update succeeded,
//! so a crash mid-ingest leaves at worst orphaned blobs and an unchanged,
//! consistent chain.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::clock::{SlotClock, now_ms};
use crate::consensus::{
    ChainError, ChainValidator, ConsensusConfig, Finalizer, Producer, ValidatorRegistry,
};
use crate::events::{ChainEvent, EventBus};
use crate::hamt::HamtIndex;
use crate::merkle;
use crate::pool::JudgmentPool;
use crate::storage::{CidStore, StorageError};
use crate::types::{Attestation, AttesterKey, Block, Cid, Hash256, JudgmentRef, NodeId};

/// Metadata record key in the store's meta region.
const META_KEY: &[u8] = b"chain";

/// The single mutable record anchoring all durable chain state.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ChainMeta {
    genesis_cid: Cid,
    head_cid: Cid,
    head_slot: u64,
    finalized_slot: u64,
    judgment_count: u64,
    slot_root: Option<Cid>,
    hash_root: Option<Cid>,
    judgment_root: Option<Cid>,
}

/// Merkle inclusion proof for one judgment.
///
/// A verifier holding only `{judgments_root, judgment CID, path, index}`
/// can recompute the root via [`verify_judgment_proof`]; `block_hash` and
/// `block_slot` let it separately confirm the block's place in the chain.
#[derive(Clone, Debug)]
pub struct JudgmentProof {
    pub block_slot: u64,
    pub block_hash: Cid,
    pub judgments_root: Cid,
    pub index: usize,
    pub path: Vec<Hash256>,
    pub total_judgments: usize,
}

/// Recomputes the Merkle root from `(judgment_cid, proof.path, proof.index)`
/// and compares it with `proof.judgments_root`.
pub fn verify_judgment_proof(judgment_cid: &Cid, proof: &JudgmentProof) -> bool {
    merkle::verify_path(judgment_cid, &proof.path, proof.index, &proof.judgments_root)
}

/// Result of a read-only chain integrity walk.
#[derive(Clone, Debug, Default)]
pub struct ChainReport {
    pub blocks_checked: u64,
    pub errors: Vec<String>,
}

impl ChainReport {
    /// `true` when the walked range held every invariant.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Aggregate chain statistics.
#[derive(Clone, Debug)]
pub struct ChainStats {
    pub height: u64,
    pub head_slot: u64,
    pub head_hash: Cid,
    pub finalized_slot: u64,
    pub current_slot: u64,
    pub current_epoch: u64,
    pub pending_judgments: usize,
    pub total_judgments: u64,
    pub registered_validators: usize,
}

/// The Proof-of-Judgment chain over a content-addressed store.
pub struct Chain<S> {
    config: ConsensusConfig,
    node_id: NodeId,
    store: S,
    slot_index: HamtIndex,
    hash_index: HamtIndex,
    judgment_index: HamtIndex,
    registry: ValidatorRegistry,
    pool: JudgmentPool,
    validator: ChainValidator,
    producer: Producer,
    finalizer: Finalizer,
    clock: SlotClock,
    events: EventBus,
    genesis_cid: Cid,
    head_cid: Cid,
    head_slot: u64,
    finalized_slot: u64,
    judgment_count: u64,
}

impl<S: CidStore> Chain<S> {
    /// Initializes the chain: resumes from the persisted metadata record if
    /// one exists, otherwise creates a fresh genesis block.
    pub fn init(store: S, config: ConsensusConfig, node_id: NodeId) -> Result<Self, ChainError> {
        let meta_bytes = store
            .get_meta(META_KEY)
            .map_err(|e| ChainError::Init(format!("reading chain metadata: {e}")))?;

        match meta_bytes {
            Some(bytes) => {
                let cfg = bincode::config::standard();
                let (meta, _): (ChainMeta, usize) = bincode::serde::decode_from_slice(&bytes, cfg)
                    .map_err(|e| ChainError::Init(format!("undecodable chain metadata: {e}")))?;
                Self::resume(store, config, node_id, meta)
            }
            None => Self::bootstrap(store, config, node_id),
        }
    }

    /// Reconstructs the chain from a head CID alone, ignoring any metadata
    /// record: walks the `prev_hash` links back to genesis and rebuilds the
    /// three indices from the recovered blocks.
    pub fn init_from_head(
        store: S,
        config: ConsensusConfig,
        node_id: NodeId,
        head_cid: Cid,
    ) -> Result<Self, ChainError> {
        let mut store = store;
        let mut blocks = Vec::new();
        let mut cursor = head_cid;

        loop {
            let block = load_block(&store, &cursor)
                .map_err(|e| ChainError::Init(format!("walking back from head: {e}")))?
                .ok_or_else(|| {
                    ChainError::Init(format!("missing block {} during walk-back", cursor.to_hex()))
                })?;
            if block.hash() != cursor {
                return Err(ChainError::Init(format!(
                    "block stored at {} hashes differently",
                    cursor.to_hex()
                )));
            }
            let prev = block.header.prev_hash;
            let slot = block.header.slot;
            blocks.push((cursor, block));
            match prev {
                Some(prev_cid) => {
                    if slot == 0 {
                        return Err(ChainError::Init("genesis carries a prev hash".into()));
                    }
                    cursor = prev_cid;
                }
                None => {
                    if slot != 0 {
                        return Err(ChainError::Init(format!(
                            "chain walk-back ended at slot {slot}, not genesis"
                        )));
                    }
                    break;
                }
            }
        }

        blocks.reverse();
        let genesis_cid = blocks[0].0;
        let (head_cid, head_slot) = {
            let (cid, block) = blocks.last().expect("walk-back found at least genesis");
            (*cid, block.header.slot)
        };

        let mut slot_index = HamtIndex::new();
        let mut hash_index = HamtIndex::new();
        let mut judgment_index = HamtIndex::new();
        let mut finalized_slot = 0;
        let mut judgment_count = 0u64;

        for (cid, block) in &blocks {
            let slot = block.header.slot;
            slot_index
                .set(&mut store, &slot_key(slot), *cid)
                .map_err(|e| ChainError::Init(format!("rebuilding slot index: {e}")))?;
            hash_index
                .set(&mut store, &cid.to_hex(), *cid)
                .map_err(|e| ChainError::Init(format!("rebuilding hash index: {e}")))?;
            for j in &block.judgments {
                judgment_index
                    .set(&mut store, &j.id, *cid)
                    .map_err(|e| ChainError::Init(format!("rebuilding judgment index: {e}")))?;
                judgment_count += 1;
            }
            if block.finalized {
                finalized_slot = slot;
            }
        }

        let mut chain = Self::assemble(
            store,
            config,
            node_id,
            ChainMeta {
                genesis_cid,
                head_cid,
                head_slot,
                finalized_slot,
                judgment_count,
                slot_root: slot_index.root(),
                hash_root: hash_index.root(),
                judgment_root: judgment_index.root(),
            },
        );
        chain
            .write_meta()
            .map_err(|e| ChainError::Init(format!("persisting rebuilt metadata: {e}")))?;
        info!(
            head_slot,
            blocks = blocks.len(),
            "chain reconstructed from head cid"
        );
        chain.events.emit(ChainEvent::Initialized {
            genesis: chain.genesis_cid,
            head_slot: chain.head_slot,
        });
        Ok(chain)
    }

    fn bootstrap(store: S, config: ConsensusConfig, node_id: NodeId) -> Result<Self, ChainError> {
        let mut store = store;
        let genesis = Block::genesis(node_id.clone(), now_ms());
        let genesis_cid = genesis.hash();
        store
            .put(&genesis_cid, &genesis.encode())
            .map_err(|e| ChainError::Init(format!("persisting genesis: {e}")))?;

        let mut slot_index = HamtIndex::new();
        let mut hash_index = HamtIndex::new();
        slot_index
            .set(&mut store, &slot_key(0), genesis_cid)
            .map_err(|e| ChainError::Init(format!("indexing genesis slot: {e}")))?;
        hash_index
            .set(&mut store, &genesis_cid.to_hex(), genesis_cid)
            .map_err(|e| ChainError::Init(format!("indexing genesis hash: {e}")))?;

        let mut chain = Self::assemble(
            store,
            config,
            node_id,
            ChainMeta {
                genesis_cid,
                head_cid: genesis_cid,
                head_slot: 0,
                finalized_slot: 0,
                judgment_count: 0,
                slot_root: slot_index.root(),
                hash_root: hash_index.root(),
                judgment_root: None,
            },
        );
        chain
            .write_meta()
            .map_err(|e| ChainError::Init(format!("persisting chain metadata: {e}")))?;
        info!(genesis = %genesis_cid.to_hex(), "fresh chain initialized");
        chain.events.emit(ChainEvent::Initialized {
            genesis: chain.genesis_cid,
            head_slot: 0,
        });
        Ok(chain)
    }

    fn resume(
        store: S,
        config: ConsensusConfig,
        node_id: NodeId,
        meta: ChainMeta,
    ) -> Result<Self, ChainError> {
        // The head block must be readable, or the store is corrupted.
        match load_block(&store, &meta.head_cid) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(ChainError::Init(format!(
                    "metadata names head {} but the block is missing",
                    meta.head_cid.to_hex()
                )));
            }
            Err(e) => return Err(ChainError::Init(format!("loading head block: {e}"))),
        }
        let chain = Self::assemble(store, config, node_id, meta);
        info!(head_slot = chain.head_slot, "chain resumed from metadata");
        chain.events.emit(ChainEvent::Initialized {
            genesis: chain.genesis_cid,
            head_slot: chain.head_slot,
        });
        Ok(chain)
    }

    fn assemble(store: S, config: ConsensusConfig, node_id: NodeId, meta: ChainMeta) -> Self {
        let clock = SlotClock::resume(config.slot_duration, config.epoch_length, meta.head_slot);
        Self {
            validator: ChainValidator::from_config(&config),
            producer: Producer::from_config(&config, node_id.clone()),
            finalizer: Finalizer::from_config(&config),
            pool: JudgmentPool::new(config.pool_size),
            registry: ValidatorRegistry::new(),
            events: EventBus::default(),
            slot_index: HamtIndex::at_root(meta.slot_root),
            hash_index: HamtIndex::at_root(meta.hash_root),
            judgment_index: HamtIndex::at_root(meta.judgment_root),
            clock,
            config,
            node_id,
            store,
            genesis_cid: meta.genesis_cid,
            head_cid: meta.head_cid,
            head_slot: meta.head_slot,
            finalized_slot: meta.finalized_slot,
            judgment_count: meta.judgment_count,
        }
    }

    fn write_meta(&mut self) -> Result<(), StorageError> {
        let meta = ChainMeta {
            genesis_cid: self.genesis_cid,
            head_cid: self.head_cid,
            head_slot: self.head_slot,
            finalized_slot: self.finalized_slot,
            judgment_count: self.judgment_count,
            slot_root: self.slot_index.root(),
            hash_root: self.hash_index.root(),
            judgment_root: self.judgment_index.root(),
        };
        let cfg = bincode::config::standard();
        let bytes = bincode::serde::encode_to_vec(&meta, cfg)
            .expect("chain metadata should always be serializable with bincode 2 + serde");
        self.store.put_meta(META_KEY, &bytes)
    }

    // ----- membership ------------------------------------------------------

    /// Adds a validator to the membership list.
    pub fn register_validator(&mut self, node_id: NodeId, key: AttesterKey) -> bool {
        let inserted = self.registry.register(node_id.clone(), key);
        if inserted {
            self.events
                .emit(ChainEvent::ValidatorRegistered { node_id });
        }
        inserted
    }

    /// Removes a validator from the membership list.
    pub fn unregister_validator(&mut self, node_id: &NodeId) -> bool {
        let removed = self.registry.unregister(node_id);
        if removed {
            self.events.emit(ChainEvent::ValidatorUnregistered {
                node_id: node_id.clone(),
            });
        }
        removed
    }

    /// The validator membership list.
    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    // ----- judgments -------------------------------------------------------

    /// Queues a judgment for inclusion in a future block.
    ///
    /// Returns `false` for malformed records, ids already recorded on the
    /// chain, and ids already pending.
    pub fn add_judgment(&mut self, judgment: JudgmentRef) -> bool {
        if !judgment.is_well_formed() {
            debug!(id = %judgment.id, "rejected malformed judgment");
            return false;
        }
        // A record already on the chain would poison every block built from
        // this pool; refuse it at the door.
        match self.judgment_index.has(&self.store, &judgment.id) {
            Ok(true) => return false,
            Ok(false) => {}
            Err(e) => {
                warn!(id = %judgment.id, error = %e, "judgment index probe failed");
                return false;
            }
        }
        let id = judgment.id.clone();
        let added = self.pool.add(judgment);
        if added {
            self.events.emit(ChainEvent::JudgmentPending { id });
        }
        added
    }

    /// Hands back a drained batch after a rejected candidate block.
    pub fn return_judgments(&mut self, batch: Vec<JudgmentRef>) {
        self.pool.return_batch(batch);
    }

    /// Whether a judgment id is recorded on the chain.
    pub fn has_judgment(&self, id: &str) -> Result<bool, ChainError> {
        Ok(self.judgment_index.has(&self.store, id)?)
    }

    // ----- block production ------------------------------------------------

    /// Builds a self-attested candidate block from the pending pool.
    ///
    /// Returns `None` when this node is not a registered validator or the
    /// pool is empty. The candidate is **not** ingested; pass it to
    /// [`Chain::process_block`], and on rejection hand the judgments back
    /// via [`Chain::return_judgments`] (the slot ticker does both).
    pub fn propose_block(&mut self) -> Result<Option<Block>, ChainError> {
        let Some(key) = self.registry.key_of(&self.node_id).copied() else {
            return Ok(None);
        };
        let head = self.head_block()?;
        let Some(block) = self.producer.propose(&mut self.pool, &head, now_ms(), &key) else {
            return Ok(None);
        };
        self.events.emit(ChainEvent::BlockProposed {
            slot: block.header.slot,
            hash: block.hash(),
        });
        Ok(Some(block))
    }

    /// Validates and appends a block to the chain.
    ///
    /// On success the block is persisted, all three indices are updated,
    /// the head advances, and the finalizer runs over the attestations the
    /// block carried in. On failure the chain is unchanged.
    pub fn process_block(&mut self, block: Block) -> Result<(), ChainError> {
        let head = self.head_block()?;
        self.validator
            .validate_block(&block, &head, &self.judgment_index, &self.store, &self.registry)?;

        let mut block = block;
        let cid = block.hash();
        let slot = block.header.slot;

        // Quorum may already be met by the attestations that arrived with
        // the block (a one-validator chain finalizes its own proposals).
        let finalized_now = self.finalizer.on_attestation(&mut block, self.registry.len());

        // First write of this CID: the strict put catches divergent bytes
        // already stored under it. Later attestation absorption goes
        // through `replace` after loading the stored envelope.
        self.store.put(&cid, &block.encode())?;

        // Stage every sub-index update; nothing below touches `self` until
        // all of them succeeded.
        let mut slot_index = self.slot_index;
        let mut hash_index = self.hash_index;
        let mut judgment_index = self.judgment_index;
        slot_index.set(&mut self.store, &slot_key(slot), cid)?;
        hash_index.set(&mut self.store, &cid.to_hex(), cid)?;
        for j in &block.judgments {
            judgment_index.set(&mut self.store, &j.id, cid)?;
        }

        self.slot_index = slot_index;
        self.hash_index = hash_index;
        self.judgment_index = judgment_index;
        self.head_cid = cid;
        self.head_slot = slot;
        self.judgment_count += block.judgments.len() as u64;
        if finalized_now {
            self.finalized_slot = self.finalized_slot.max(slot);
        }
        self.write_meta()?;

        info!(
            slot,
            hash = %cid.to_hex(),
            judgments = block.judgments.len(),
            "block added"
        );
        self.events.emit(ChainEvent::BlockAdded {
            slot,
            hash: cid,
            judgments: block.judgments.len(),
        });
        if finalized_now {
            info!(slot, "block finalized");
            self.events.emit(ChainEvent::BlockFinalized { slot, hash: cid });
        }
        Ok(())
    }

    /// Absorbs an attestation into the block it names.
    ///
    /// Returns `Ok(false)` for attestations that do not locate a block,
    /// fail verification, or duplicate an absorbed one; all are discarded
    /// without signal, per the failure policy.
    pub fn process_attestation(&mut self, att: Attestation) -> Result<bool, ChainError> {
        let Some(cid) = self.slot_index.get(&self.store, &slot_key(att.slot))? else {
            debug!(slot = att.slot, "attestation names an unknown slot");
            return Ok(false);
        };
        let Some(mut block) = load_block(&self.store, &cid)? else {
            return Err(StorageError::CorruptedMeta("slot index names a missing block").into());
        };

        let Some(key) = self.registry.key_of(&att.node_id).copied() else {
            debug!(node = %att.node_id.as_str(), "attestation from unregistered node");
            return Ok(false);
        };
        let node_id = att.node_id.clone();
        let slot = att.slot;
        if !block.add_attestation(att, &key) {
            debug!(node = %node_id.as_str(), slot, "attestation rejected by block");
            return Ok(false);
        }

        let finalized_now = self.finalizer.on_attestation(&mut block, self.registry.len());
        self.store.replace(&cid, &block.encode())?;
        if finalized_now {
            self.finalized_slot = self.finalized_slot.max(slot);
            self.write_meta()?;
        }

        self.events
            .emit(ChainEvent::AttestationReceived { node_id, slot });
        if finalized_now {
            info!(slot, "block finalized");
            self.events.emit(ChainEvent::BlockFinalized { slot, hash: cid });
        }
        Ok(true)
    }

    /// One producer turn: emit the tick, propose, ingest, and on rejection
    /// hand the drained judgments back to the pool.
    ///
    /// Errors are logged rather than propagated so a transient failure does
    /// not kill the ticker task.
    pub fn on_slot_tick(&mut self) {
        self.events.emit(ChainEvent::SlotTick {
            slot: self.clock.current_slot(),
        });
        let block = match self.propose_block() {
            Ok(Some(block)) => block,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "block proposal failed");
                return;
            }
        };
        let batch = block.judgments.clone();
        if let Err(e) = self.process_block(block) {
            warn!(error = %e, "proposed block rejected, returning judgments");
            self.return_judgments(batch);
        }
    }

    // ----- lookups ---------------------------------------------------------

    /// The block currently at the head of the chain.
    pub fn head_block(&self) -> Result<Block, ChainError> {
        load_block(&self.store, &self.head_cid)?
            .ok_or_else(|| StorageError::CorruptedMeta("missing head block").into())
    }

    /// The block occupying `slot`, if any.
    pub fn get_block_by_slot(&self, slot: u64) -> Result<Option<Block>, ChainError> {
        match self.slot_index.get(&self.store, &slot_key(slot))? {
            Some(cid) => Ok(load_block(&self.store, &cid)?),
            None => Ok(None),
        }
    }

    /// The block with the given hash, if any.
    pub fn get_block_by_hash(&self, hash: &Cid) -> Result<Option<Block>, ChainError> {
        match self.hash_index.get(&self.store, &hash.to_hex())? {
            Some(cid) => Ok(load_block(&self.store, &cid)?),
            None => Ok(None),
        }
    }

    /// The block containing the judgment with the given id, if any.
    pub fn find_judgment_block(&self, id: &str) -> Result<Option<Block>, ChainError> {
        match self.judgment_index.get(&self.store, id)? {
            Some(cid) => Ok(load_block(&self.store, &cid)?),
            None => Ok(None),
        }
    }

    /// Blocks in the inclusive slot range `[from, to]`, ascending. Slots
    /// past the head are ignored.
    pub fn get_block_range(&self, from: u64, to: u64) -> Result<Vec<Block>, ChainError> {
        let to = to.min(self.head_slot);
        let mut blocks = Vec::new();
        for slot in from..=to {
            if let Some(block) = self.get_block_by_slot(slot)? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    /// The most recent `n` blocks, ascending by slot.
    pub fn get_recent_blocks(&self, n: u64) -> Result<Vec<Block>, ChainError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let from = self.head_slot.saturating_sub(n - 1);
        self.get_block_range(from, self.head_slot)
    }

    // ----- verification ----------------------------------------------------

    /// Walks `[from, to]`, revalidating each block in isolation and
    /// re-checking slot succession and predecessor linkage. Read-only.
    pub fn verify_chain(&self, from: u64, to: u64) -> Result<ChainReport, ChainError> {
        let to = to.min(self.head_slot);
        let mut report = ChainReport::default();
        let mut prev: Option<Block> = None;

        for slot in from..=to {
            let Some(block) = self.get_block_by_slot(slot)? else {
                report.errors.push(format!("no block at slot {slot}"));
                prev = None;
                continue;
            };
            report.blocks_checked += 1;

            let local = block.validate(self.config.max_judgments_per_block);
            for e in local.errors {
                report.errors.push(format!("slot {slot}: {e}"));
            }

            if let Some(prev_block) = &prev {
                if block.header.slot != prev_block.header.slot + 1 {
                    report.errors.push(format!(
                        "slot {slot}: succession broken after slot {}",
                        prev_block.header.slot
                    ));
                }
                if block.header.prev_hash != Some(prev_block.hash()) {
                    report
                        .errors
                        .push(format!("slot {slot}: prev hash does not match predecessor"));
                }
            }
            prev = Some(block);
        }
        Ok(report)
    }

    /// Builds the Merkle inclusion proof for a recorded judgment.
    pub fn get_judgment_proof(&self, id: &str) -> Result<Option<JudgmentProof>, ChainError> {
        let Some(block) = self.find_judgment_block(id)? else {
            return Ok(None);
        };
        let Some(index) = block.judgment_index(id) else {
            return Err(StorageError::CorruptedMeta("judgment index names a block without the judgment").into());
        };
        let cids = block.judgment_cids();
        let path = merkle::path(&cids, index).expect("index comes from the same list");
        Ok(Some(JudgmentProof {
            block_slot: block.header.slot,
            block_hash: block.hash(),
            judgments_root: block.header.judgments_root,
            index,
            path,
            total_judgments: cids.len(),
        }))
    }

    // ----- reporting -------------------------------------------------------

    /// Aggregate statistics over the current chain state.
    pub fn get_stats(&self) -> ChainStats {
        ChainStats {
            height: self.head_slot + 1,
            head_slot: self.head_slot,
            head_hash: self.head_cid,
            finalized_slot: self.finalized_slot,
            current_slot: self.clock.current_slot(),
            current_epoch: self.clock.current_epoch(),
            pending_judgments: self.pool.len(),
            total_judgments: self.judgment_count,
            registered_validators: self.registry.len(),
        }
    }

    /// Writes the full chain as JSON: `{version, nodeId, exportedAt,
    /// blocks}` with blocks ordered by slot and hashes hex-encoded.
    pub fn export(&self, path: &Path) -> Result<(), ChainError> {
        let mut blocks = Vec::with_capacity((self.head_slot + 1) as usize);
        for slot in 0..=self.head_slot {
            if let Some(block) = self.get_block_by_slot(slot)? {
                blocks.push(block_to_json(&block));
            }
        }
        let doc = serde_json::json!({
            "version": 1,
            "nodeId": self.node_id.as_str(),
            "exportedAt": now_ms(),
            "blocks": blocks,
        });
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| ChainError::Export(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| ChainError::Export(e.to_string()))?;
        Ok(())
    }

    // ----- accessors -------------------------------------------------------

    /// Registers an observer for lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// This node's identifier.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// The consensus configuration.
    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// The slot clock.
    pub fn clock(&self) -> &SlotClock {
        &self.clock
    }

    /// CID of the genesis block.
    pub fn genesis_cid(&self) -> Cid {
        self.genesis_cid
    }

    /// Hash of the head block.
    pub fn head_hash(&self) -> Cid {
        self.head_cid
    }

    /// Slot of the head block.
    pub fn head_slot(&self) -> u64 {
        self.head_slot
    }

    /// Highest finalized slot.
    pub fn finalized_slot(&self) -> u64 {
        self.finalized_slot
    }

    /// Number of blocks on the chain.
    pub fn height(&self) -> u64 {
        self.head_slot + 1
    }

    /// Number of judgments pending in the pool.
    pub fn pending_judgments(&self) -> usize {
        self.pool.len()
    }

    /// Consumes the chain and hands back the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }
}

fn slot_key(slot: u64) -> String {
    slot.to_string()
}

fn load_block<S: CidStore>(store: &S, cid: &Cid) -> Result<Option<Block>, ChainError> {
    let Some(bytes) = store.get(cid)? else {
        return Ok(None);
    };
    let block = Block::decode(&bytes).map_err(|e| ChainError::BlockDecode(e.to_string()))?;
    Ok(Some(block))
}

fn block_to_json(block: &Block) -> serde_json::Value {
    serde_json::json!({
        "hash": block.hash().to_hex(),
        "header": {
            "slot": block.header.slot,
            "timestampMs": block.header.timestamp_ms,
            "prevHash": block.header.prev_hash.map(|c| c.to_hex()),
            "judgmentsRoot": block.header.judgments_root.to_hex(),
            "proposer": block.header.proposer.as_str(),
        },
        "judgments": block.judgments.iter().map(|j| serde_json::json!({
            "id": j.id,
            "cid": j.cid.to_hex(),
            "qScore": j.q_score,
            "verdict": j.verdict,
            "metadata": hex::encode(&j.metadata),
        })).collect::<Vec<_>>(),
        "attestations": block.attestations.iter().map(|a| serde_json::json!({
            "nodeId": a.node_id.as_str(),
            "slot": a.slot,
            "blockHash": a.block_hash.to_hex(),
            "signature": hex::encode(a.signature.as_bytes()),
        })).collect::<Vec<_>>(),
        "finalized": block.finalized,
    })
}

/// Handle to the background slot ticker task.
///
/// The ticker drives [`Chain::on_slot_tick`] at the configured slot period;
/// [`SlotTicker::stop`] shuts it down cleanly, letting an in-flight tick
/// complete.
pub struct SlotTicker {
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl SlotTicker {
    /// Spawns the ticker over a shared chain.
    pub fn spawn<S>(chain: Arc<tokio::sync::Mutex<Chain<S>>>, period: Duration) -> Self
    where
        S: CidStore + Send + 'static,
    {
        let (shutdown, mut watch_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.max(Duration::from_micros(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        chain.lock().await.on_slot_tick();
                    }
                    changed = watch_rx.changed() => {
                        if changed.is_err() || *watch_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Stops the ticker and waits for the task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
