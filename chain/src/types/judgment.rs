// chain/src/types/judgment.rs

//! Judgment records referenced by blocks.
//!
//! A judgment is a scored evaluation produced by an upstream component. The
//! chain never interprets the evaluation itself; it records a stable
//! reference to it (a [`JudgmentRef`]) so the record is durably ordered and
//! provable via Merkle inclusion.

use serde::{Deserialize, Serialize};

use super::Cid;

/// Verdict attached to a judgment by the upstream evaluator.
///
/// The four-valued scale is part of the wire format and must not be
/// renumbered: the canonical encoding is positional.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Strong approval.
    Howl,
    /// Approval.
    Wag,
    /// Disapproval.
    Growl,
    /// Strong disapproval.
    Bark,
}

/// Reference to one judgment, as stored inside a block.
///
/// `id` is unique across the entire chain: the same id appearing in two
/// blocks is a fatal integrity error, enforced at ingest via the judgment
/// index. `cid` addresses the full judgment payload, which lives in the
/// content store and is the leaf value of the block's Merkle tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JudgmentRef {
    /// Chain-wide unique identifier assigned by the upstream producer.
    pub id: String,

    /// Content identifier of the judgment payload.
    pub cid: Cid,

    /// Quality score in `[0, 100]`.
    pub q_score: u8,

    /// Evaluator verdict.
    pub verdict: Verdict,

    /// Opaque metadata carried through encode/decode untouched.
    ///
    /// Upstream producers attach free-form fields here. Because the canonical
    /// encoding is not self-describing, map-valued metadata must already be
    /// serialized by the caller in a canonical field order; the chain treats
    /// the result as plain bytes.
    pub metadata: Vec<u8>,
}

impl JudgmentRef {
    /// Constructs a judgment reference with no metadata.
    pub fn new(id: impl Into<String>, cid: Cid, q_score: u8, verdict: Verdict) -> Self {
        Self {
            id: id.into(),
            cid,
            q_score,
            verdict,
            metadata: Vec::new(),
        }
    }

    /// Returns `true` if the record satisfies its local schema: a non-empty
    /// id and a score within `[0, 100]`.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && self.q_score <= 100
    }
}
