//! Core domain types used by the chain
//!
//! This module defines strongly-typed hashes, content identifiers, node
//! identifiers, and attester key material that are shared across the chain
//! implementation. The goal is to avoid "naked" byte buffers in public APIs
//! and instead use domain-specific newtypes.

use serde::{Deserialize, Serialize};

/// Block, header, and attestation types.
pub mod block;
/// Judgment records referenced by blocks.
pub mod judgment;

pub use block::{Attestation, Block, BlockValidation, Header};
pub use judgment::{JudgmentRef, Verdict};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// This type is used as the backing representation for all fixed-size hashes
/// in the chain (content identifiers, Merkle nodes, attestation MACs). It is
/// always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    ///
    /// The result is deterministic for a given byte slice and is suitable
    /// for use as an identifier or content hash, but it is **not**
    /// a password hash or KDF.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

/// Content identifier: the BLAKE3-256 hash of a canonical byte encoding.
///
/// A `Cid` is both the primary key of the content-addressed store and the
/// link target of the chain's indices. Two blobs with the same bytes always
/// produce the same `Cid`. The textual form is 64 lowercase hex characters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cid(pub Hash256);

impl Cid {
    /// Derives the [`Cid`] of a canonical byte encoding.
    ///
    /// Callers must pass canonical bytes; logically equal values with
    /// different encodings receive different identifiers.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Cid(Hash256::compute(bytes))
    }

    /// Returns the underlying [`Hash256`] backing this identifier.
    pub fn as_hash(&self) -> &Hash256 {
        &self.0
    }

    /// Returns the 64-character lowercase hex form of this identifier.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    /// Parses a [`Cid`] from its 64-character hex form.
    ///
    /// Returns `None` if `s` is not valid hex or does not decode to exactly
    /// [`HASH_LEN`] bytes.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != HASH_LEN {
            return None;
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&bytes);
        Some(Cid(Hash256(arr)))
    }
}

/// Identifier of a chain node (validator or observer).
///
/// Node identifiers are short, human-readable strings chosen at deployment
/// time (e.g. `"n1"`). They name proposers in block headers and attesters in
/// attestations; the membership list maps them to attester keys.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Constructs a node identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Keyed-hash key material for one attester.
///
/// Attestation signatures are `blake3::keyed_hash(key, payload)` MACs, not
/// asymmetric signatures: they are only sound under trusted distribution of
/// these keys to the validator set. The chain never generates keys; they are
/// caller-supplied configuration.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct AttesterKey(pub [u8; HASH_LEN]);

impl AttesterKey {
    /// Derives a key from arbitrary seed bytes.
    ///
    /// Handy for tests and simulations; production deployments should load
    /// uniformly random 32-byte keys from their secret store instead.
    pub fn from_seed(seed: &[u8]) -> Self {
        AttesterKey(Hash256::compute(seed).0)
    }

    /// Returns the raw 32-byte key.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for AttesterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.write_str("AttesterKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash256_is_deterministic() {
        let a = Hash256::compute(b"judgment");
        let b = Hash256::compute(b"judgment");
        assert_eq!(a, b);
        assert_ne!(a, Hash256::compute(b"judgement"));
    }

    #[test]
    fn cid_hex_roundtrip() {
        let cid = Cid::from_bytes(b"some canonical bytes");
        let hex_form = cid.to_hex();
        assert_eq!(hex_form.len(), 64);
        assert_eq!(Cid::from_hex(&hex_form), Some(cid));
    }

    #[test]
    fn cid_from_hex_rejects_bad_input() {
        assert_eq!(Cid::from_hex("zz"), None);
        assert_eq!(Cid::from_hex("abcd"), None);
        let too_long = "00".repeat(HASH_LEN + 1);
        assert_eq!(Cid::from_hex(&too_long), None);
    }

    #[test]
    fn attester_key_debug_hides_material() {
        let key = AttesterKey::from_seed(b"seed");
        assert_eq!(format!("{key:?}"), "AttesterKey(..)");
    }
}
