// chain/src/hamt.rs

//! Persistent hash-array-mapped-trie index `string → CID`.
//!
//! Index nodes are themselves content-addressed blobs in the [`CidStore`]:
//! `set` never mutates an existing node, it writes new nodes along the
//! updated path and returns a new root. Old roots therefore stay readable
//! forever (structural sharing), which gives cheap historical snapshots and
//! makes crash recovery trivial: the last durable root is the last
//! consistent state.
//!
//! Keys are routed by the nibbles of their BLAKE3-256 hash, giving a
//! branching factor of 16 and a maximum depth of 64. Keys whose full hashes
//! collide (not expected in practice) share a collision leaf at the bottom.

use serde::{Deserialize, Serialize};

use crate::storage::{CidStore, StorageError};
use crate::types::{Cid, HASH_LEN, Hash256};

/// Nibbles per hash, i.e. the maximum trie depth.
const MAX_DEPTH: usize = HASH_LEN * 2;

/// One trie node, stored at the CID of its canonical encoding.
#[derive(Clone, Debug, Serialize, Deserialize)]
enum HamtNode {
    /// Interior node: one child slot per nibble value.
    Branch { children: [Option<Cid>; 16] },
    /// Bottom node: the entries whose hash path ends here.
    Leaf { entries: Vec<(String, Cid)> },
}

fn nibble(key_hash: &Hash256, depth: usize) -> usize {
    let byte = key_hash.as_bytes()[depth / 2];
    if depth % 2 == 0 {
        (byte >> 4) as usize
    } else {
        (byte & 0x0F) as usize
    }
}

fn load_node<S: CidStore>(store: &S, cid: &Cid) -> Result<HamtNode, StorageError> {
    let bytes = store
        .get(cid)?
        .ok_or(StorageError::CorruptedMeta("dangling hamt node link"))?;
    let cfg = bincode::config::standard();
    let (node, _) = bincode::serde::decode_from_slice(&bytes, cfg)
        .map_err(|_| StorageError::CorruptedMeta("undecodable hamt node"))?;
    Ok(node)
}

fn write_node<S: CidStore>(store: &mut S, node: &HamtNode) -> Result<Cid, StorageError> {
    let cfg = bincode::config::standard();
    let bytes = bincode::serde::encode_to_vec(node, cfg)
        .expect("hamt node should always be serializable with bincode 2 + serde");
    let cid = Cid::from_bytes(&bytes);
    store.put(&cid, &bytes)?;
    Ok(cid)
}

/// Handle to one persistent index: a root pointer plus map operations.
///
/// The handle does not own the store; every operation takes it explicitly so
/// several indices can share one backend (the chain runs three).
#[derive(Clone, Copy, Debug, Default)]
pub struct HamtIndex {
    root: Option<Cid>,
}

impl HamtIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Reopens an index at a previously persisted root.
    pub fn at_root(root: Option<Cid>) -> Self {
        Self { root }
    }

    /// The current root, `None` while the index is empty.
    pub fn root(&self) -> Option<Cid> {
        self.root
    }

    /// Looks up the value stored under `key`.
    pub fn get<S: CidStore>(&self, store: &S, key: &str) -> Result<Option<Cid>, StorageError> {
        let key_hash = Hash256::compute(key.as_bytes());
        let mut cursor = self.root;
        let mut depth = 0;
        while let Some(cid) = cursor {
            match load_node(store, &cid)? {
                HamtNode::Leaf { entries } => {
                    return Ok(entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v));
                }
                HamtNode::Branch { children } => {
                    cursor = children[nibble(&key_hash, depth)];
                    depth += 1;
                }
            }
        }
        Ok(None)
    }

    /// Whether `key` is present.
    pub fn has<S: CidStore>(&self, store: &S, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(store, key)?.is_some())
    }

    /// Binds `key` to `value`, writing new nodes along the updated path.
    ///
    /// Returns the new root. The previous root (if any) remains a readable
    /// snapshot of the pre-`set` state.
    pub fn set<S: CidStore>(
        &mut self,
        store: &mut S,
        key: &str,
        value: Cid,
    ) -> Result<Cid, StorageError> {
        let key_hash = Hash256::compute(key.as_bytes());
        let new_root = insert(store, self.root.as_ref(), 0, &key_hash, key, value)?;
        self.root = Some(new_root);
        Ok(new_root)
    }
}

fn insert<S: CidStore>(
    store: &mut S,
    node_cid: Option<&Cid>,
    depth: usize,
    key_hash: &Hash256,
    key: &str,
    value: Cid,
) -> Result<Cid, StorageError> {
    let Some(cid) = node_cid else {
        return write_node(
            store,
            &HamtNode::Leaf {
                entries: vec![(key.to_string(), value)],
            },
        );
    };

    match load_node(store, cid)? {
        HamtNode::Leaf { mut entries } => {
            if let Some(slot) = entries.iter_mut().find(|(k, _)| k == key) {
                slot.1 = value;
                return write_node(store, &HamtNode::Leaf { entries });
            }
            if depth >= MAX_DEPTH {
                // Full 256-bit hash collision: keep a collision list.
                entries.push((key.to_string(), value));
                return write_node(store, &HamtNode::Leaf { entries });
            }
            // Split: push the resident entries and the new one a level down.
            let mut children: [Option<Cid>; 16] = [None; 16];
            for (k, v) in entries {
                let h = Hash256::compute(k.as_bytes());
                let idx = nibble(&h, depth);
                children[idx] = Some(insert(store, children[idx].as_ref(), depth + 1, &h, &k, v)?);
            }
            let idx = nibble(key_hash, depth);
            children[idx] = Some(insert(
                store,
                children[idx].as_ref(),
                depth + 1,
                key_hash,
                key,
                value,
            )?);
            write_node(store, &HamtNode::Branch { children })
        }
        HamtNode::Branch { mut children } => {
            let idx = nibble(key_hash, depth);
            children[idx] = Some(insert(
                store,
                children[idx].as_ref(),
                depth + 1,
                key_hash,
                key,
                value,
            )?);
            write_node(store, &HamtNode::Branch { children })
        }
    }
}
