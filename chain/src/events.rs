// chain/src/events.rs

//! Lifecycle notifications emitted by the chain.
//!
//! Every well-defined lifecycle point of the chain maps to one
//! [`ChainEvent`] variant. Delivery is in-process over a broadcast channel:
//! emitting never blocks the chain actor, and a subscriber that falls behind
//! observes a `Lagged` error instead of slowing everyone else down.

use tokio::sync::broadcast;

use crate::types::{Cid, NodeId};

/// Tagged lifecycle notification.
#[derive(Clone, Debug)]
pub enum ChainEvent {
    /// The chain finished initializing (fresh genesis or resumed state).
    Initialized { genesis: Cid, head_slot: u64 },
    /// A candidate block was built by the local producer.
    BlockProposed { slot: u64, hash: Cid },
    /// A block passed validation and was appended to the chain.
    BlockAdded {
        slot: u64,
        hash: Cid,
        judgments: usize,
    },
    /// A block reached quorum and was finalized.
    BlockFinalized { slot: u64, hash: Cid },
    /// A valid attestation was absorbed into a block.
    AttestationReceived { node_id: NodeId, slot: u64 },
    /// A judgment entered the pending pool.
    JudgmentPending { id: String },
    /// A validator joined the membership list.
    ValidatorRegistered { node_id: NodeId },
    /// A validator left the membership list.
    ValidatorUnregistered { node_id: NodeId },
    /// The slot ticker advanced.
    SlotTick { slot: u64 },
}

/// Broadcast fan-out for [`ChainEvent`]s.
///
/// Cheap to clone; all clones feed the same set of subscribers.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<ChainEvent>,
}

impl EventBus {
    /// Creates a bus whose subscribers buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Registers a new subscriber. Only events emitted after this call are
    /// observed.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.tx.subscribe()
    }

    /// Emits an event to all current subscribers.
    ///
    /// A bus without subscribers drops the event silently.
    pub fn emit(&self, event: ChainEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, Hash256};

    fn dummy_cid(byte: u8) -> Cid {
        Cid(Hash256([byte; HASH_LEN]))
    }

    #[test]
    fn emit_without_subscribers_is_a_noop() {
        let bus = EventBus::default();
        bus.emit(ChainEvent::SlotTick { slot: 1 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_observe_events_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(ChainEvent::BlockAdded {
            slot: 1,
            hash: dummy_cid(1),
            judgments: 2,
        });
        bus.emit(ChainEvent::BlockFinalized {
            slot: 1,
            hash: dummy_cid(1),
        });

        match rx.recv().await.expect("first event") {
            ChainEvent::BlockAdded { slot, judgments, .. } => {
                assert_eq!(slot, 1);
                assert_eq!(judgments, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.expect("second event") {
            ChainEvent::BlockFinalized { slot, .. } => assert_eq!(slot, 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn late_subscribers_miss_earlier_events() {
        let bus = EventBus::default();
        bus.emit(ChainEvent::SlotTick { slot: 7 });

        let mut rx = bus.subscribe();
        bus.emit(ChainEvent::SlotTick { slot: 8 });

        match rx.recv().await.expect("event") {
            ChainEvent::SlotTick { slot } => assert_eq!(slot, 8),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
