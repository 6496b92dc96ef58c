// chain/src/pool.rs

//! Pending-judgment pool.
//!
//! A bounded FIFO buffer of judgments awaiting inclusion in a block,
//! deduplicated by judgment id. The pool is the single mutator point for
//! pending state: the producer drains batches from the head and returns them
//! if a candidate block is rejected.

use std::collections::{HashSet, VecDeque};

use crate::types::JudgmentRef;

/// Bounded FIFO pool of pending judgments, deduplicated by id.
#[derive(Debug)]
pub struct JudgmentPool {
    entries: VecDeque<JudgmentRef>,
    ids: HashSet<String>,
    capacity: usize,
}

impl JudgmentPool {
    /// Creates an empty pool with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            ids: HashSet::new(),
            capacity,
        }
    }

    /// Inserts a judgment at the tail.
    ///
    /// Returns `false` without replacement if a judgment with the same id is
    /// already pending. When the pool is at capacity, the oldest entry is
    /// evicted to make room.
    pub fn add(&mut self, judgment: JudgmentRef) -> bool {
        if self.ids.contains(&judgment.id) {
            return false;
        }
        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                self.ids.remove(&evicted.id);
            }
        }
        self.ids.insert(judgment.id.clone());
        self.entries.push_back(judgment);
        true
    }

    /// Atomically removes and returns up to `limit` judgments from the head,
    /// oldest first.
    pub fn get_batch(&mut self, limit: usize) -> Vec<JudgmentRef> {
        let take = limit.min(self.entries.len());
        let batch: Vec<JudgmentRef> = self.entries.drain(..take).collect();
        for j in &batch {
            self.ids.remove(&j.id);
        }
        batch
    }

    /// Re-inserts a drained batch at the head, preserving its order.
    ///
    /// Used when a candidate block is rejected. The pool may transiently
    /// exceed its capacity here; subsequent [`JudgmentPool::add`] calls evict
    /// from the oldest end as usual.
    pub fn return_batch(&mut self, batch: Vec<JudgmentRef>) {
        for j in batch.into_iter().rev() {
            if self.ids.insert(j.id.clone()) {
                self.entries.push_front(j);
            }
        }
    }

    /// Whether a judgment with this id is pending.
    pub fn has(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of pending judgments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all pending judgments.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
    }
}
