use std::time::Duration;

/// Consensus configuration parameters.
///
/// This includes both protocol-level knobs (slot period, quorum threshold)
/// and implementation-level limits (judgments per block, pool capacity).
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Wall-clock period of one slot.
    ///
    /// The protocol's nominal period is 61.8 ms; it is carried here as a
    /// whole number of microseconds so the sub-millisecond fraction is not
    /// silently rounded away.
    pub slot_duration: Duration,
    /// Hard cap on the number of judgment refs per block.
    pub max_judgments_per_block: usize,
    /// Number of slots per epoch.
    pub epoch_length: u64,
    /// Fraction of the registered validator set whose attestations finalize
    /// a block. The default is the inverse golden ratio.
    pub quorum_threshold: f64,
    /// Capacity of the pending-judgment pool.
    pub pool_size: usize,
    /// Whether block proposers must appear in the validator registry.
    pub enforce_proposer_registry: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            slot_duration: Duration::from_micros(61_800),
            max_judgments_per_block: 13,
            epoch_length: 32,
            quorum_threshold: 0.618,
            pool_size: 1_000,
            enforce_proposer_registry: true,
        }
    }
}
