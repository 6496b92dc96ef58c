//! Proof-of-Judgment chain library crate.
//!
//! This crate provides the core building blocks for a content-addressed,
//! slot-timed append-only ledger of judgment records:
//!
//! - strongly-typed domain types (`types`),
//! - a deterministic Merkle tree with inclusion proofs (`merkle`),
//! - a content-addressed store abstraction and backends (`storage`),
//! - persistent HAMT indices over that store (`hamt`),
//! - a bounded pending-judgment pool (`pool`),
//! - a wall-clock slot/epoch mapping (`clock`),
//! - the consensus layer: validation, production, finalization
//!   (`consensus`),
//! - the chain facade and slot ticker (`chain`),
//! - lifecycle notifications (`events`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries can compose these pieces to build validator
//! nodes, simulators, and experiment harnesses.

pub mod chain;
pub mod clock;
pub mod config;
pub mod consensus;
pub mod events;
pub mod hamt;
pub mod merkle;
pub mod metrics;
pub mod pool;
pub mod storage;
pub mod types;

// Re-export top-level configuration types.
pub use config::{MetricsConfig, NodeConfig};

// Re-export the chain facade and its reporting types.
pub use chain::{
    Chain, ChainReport, ChainStats, JudgmentProof, SlotTicker, verify_judgment_proof,
};

// Re-export "core" consensus types.
pub use consensus::{
    ChainError, ChainValidator, ConsensusConfig, Finalizer, Producer, ValidationError,
    ValidatorRegistry,
};

// Re-export storage backends.
pub use storage::{CidStore, MemoryCidStore, RocksDbCidStore, RocksDbConfig, StorageError};

// Re-export the remaining building blocks.
pub use clock::SlotClock;
pub use events::{ChainEvent, EventBus};
pub use hamt::HamtIndex;
pub use pool::JudgmentPool;

// Re-export metrics registry and exporter.
pub use metrics::{ChainMetrics, MetricsExporter, MetricsRegistry};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the default store backend of a "typical" node.
pub type DefaultCidStore = RocksDbCidStore;

/// Type alias for the default chain stack (RocksDB-backed).
pub type DefaultChain = Chain<DefaultCidStore>;
