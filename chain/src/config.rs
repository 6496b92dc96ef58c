//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - consensus parameters (`ConsensusConfig`),
//! - storage (RocksDB path and creation flags),
//! - metrics exporter (enable flag + listen address),
//! - the local node identity.
//!
//! The goal is to have a single `NodeConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files,
//! or environment variables as needed.

use std::net::SocketAddr;

use crate::consensus::ConsensusConfig;
use crate::storage::RocksDbConfig;
use crate::types::NodeId;

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a chain node.
///
/// This aggregates all the sub-configs needed to wire up a typical node:
///
/// - the local node identity (`node_id`),
/// - consensus tuning (`consensus`),
/// - persistent storage (`storage`),
/// - Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub consensus: ConsensusConfig,
    pub storage: RocksDbConfig,
    pub metrics: MetricsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId::new("n1"),
            consensus: ConsensusConfig::default(),
            storage: RocksDbConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
