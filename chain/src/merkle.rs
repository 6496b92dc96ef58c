// chain/src/merkle.rs

//! Deterministic binary Merkle tree over an ordered list of CIDs.
//!
//! The root depends only on the ordered list: leaves are the BLAKE3-256
//! hashes of the CID bytes, parents hash the concatenation of their two
//! children, and a level of odd length duplicates its last node. The root of
//! the empty list is the BLAKE3-256 hash of the empty string:
//!
//! `af1349b9f5f9a1a6a0404dee36dcc9499bcb25c9adc112b7cc9a93cae41f3262`
//!
//! Inclusion proofs carry the full sibling list needed to recompute the root
//! from one leaf; [`verify_path`] is the matching verifier.

use crate::types::{Cid, Hash256};

fn hash_leaf(cid: &Cid) -> Hash256 {
    Hash256::compute(cid.as_hash().as_bytes())
}

fn combine(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut buf = [0u8; 2 * crate::types::HASH_LEN];
    buf[..crate::types::HASH_LEN].copy_from_slice(left.as_bytes());
    buf[crate::types::HASH_LEN..].copy_from_slice(right.as_bytes());
    Hash256::compute(&buf)
}

/// All tree levels, leaves first. Empty input yields no levels.
fn build_levels(cids: &[Cid]) -> Vec<Vec<Hash256>> {
    if cids.is_empty() {
        return Vec::new();
    }
    let mut levels = vec![cids.iter().map(hash_leaf).collect::<Vec<_>>()];
    while levels.last().map(Vec::len) != Some(1) {
        let prev = levels.last().expect("levels is non-empty");
        let mut next = Vec::with_capacity(prev.len().div_ceil(2));
        for pair in prev.chunks(2) {
            let left = &pair[0];
            // Odd level: the last node is paired with itself.
            let right = pair.get(1).unwrap_or(left);
            next.push(combine(left, right));
        }
        levels.push(next);
    }
    levels
}

/// Merkle root of an ordered list of CIDs.
pub fn root(cids: &[Cid]) -> Cid {
    match build_levels(cids).last() {
        Some(top) => Cid(top[0]),
        None => Cid(Hash256::compute(b"")),
    }
}

/// Sibling hashes needed to recompute the root from the leaf at `index`,
/// ordered leaf-to-root. A single-leaf tree has an empty path.
///
/// Returns `None` when `index` is out of bounds.
pub fn path(cids: &[Cid], index: usize) -> Option<Vec<Hash256>> {
    if index >= cids.len() {
        return None;
    }
    let levels = build_levels(cids);
    let mut siblings = Vec::new();
    let mut idx = index;
    for level in &levels[..levels.len() - 1] {
        let sibling_idx = idx ^ 1;
        // A duplicated last node is its own sibling.
        let sibling = level.get(sibling_idx).unwrap_or(&level[idx]);
        siblings.push(*sibling);
        idx /= 2;
    }
    Some(siblings)
}

/// Recomputes the root from `(leaf, path, index)` and compares it with
/// `expected_root`.
pub fn verify_path(leaf: &Cid, path: &[Hash256], index: usize, expected_root: &Cid) -> bool {
    let mut acc = hash_leaf(leaf);
    let mut idx = index;
    for sibling in path {
        acc = if idx & 1 == 1 {
            combine(sibling, &acc)
        } else {
            combine(&acc, sibling)
        };
        idx /= 2;
    }
    Cid(acc) == *expected_root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HASH_LEN;

    fn dummy_cid(byte: u8) -> Cid {
        Cid(Hash256([byte; HASH_LEN]))
    }

    fn cids(bytes: &[u8]) -> Vec<Cid> {
        bytes.iter().map(|b| dummy_cid(*b)).collect()
    }

    #[test]
    fn empty_root_is_the_documented_constant() {
        assert_eq!(
            root(&[]).to_hex(),
            "af1349b9f5f9a1a6a0404dee36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn root_is_stable_and_order_sensitive() {
        let abc = cids(&[1, 2, 3]);
        assert_eq!(root(&abc), root(&abc));
        assert_ne!(root(&abc), root(&cids(&[1, 2, 4])));
        assert_ne!(root(&abc), root(&cids(&[3, 2, 1])));
    }

    #[test]
    fn single_leaf_root_hashes_the_cid() {
        let c = dummy_cid(7);
        assert_eq!(root(&[c]), Cid(Hash256::compute(c.as_hash().as_bytes())));
        // ...and its inclusion path is empty but still verifies.
        let p = path(&[c], 0).expect("index 0 in bounds");
        assert!(p.is_empty());
        assert!(verify_path(&c, &p, 0, &root(&[c])));
    }

    #[test]
    fn every_leaf_proves_inclusion() {
        for n in 1..=9usize {
            let list: Vec<Cid> = (0..n as u8).map(dummy_cid).collect();
            let r = root(&list);
            for (i, leaf) in list.iter().enumerate() {
                let p = path(&list, i).expect("index in bounds");
                assert!(verify_path(leaf, &p, i, &r), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let list = cids(&[1, 2, 3, 4, 5]);
        let r = root(&list);
        let p = path(&list, 2).expect("index in bounds");
        assert!(verify_path(&list[2], &p, 2, &r));
        assert!(!verify_path(&dummy_cid(0xAA), &p, 2, &r));
        // Wrong position also fails.
        assert!(!verify_path(&list[2], &p, 3, &r));
    }

    #[test]
    fn path_rejects_out_of_bounds_index() {
        let list = cids(&[1, 2]);
        assert!(path(&list, 2).is_none());
        assert!(path(&[], 0).is_none());
    }

    #[test]
    fn odd_levels_duplicate_the_last_node() {
        // With three leaves the last leaf is its own sibling at level 0.
        let list = cids(&[1, 2, 3]);
        let p = path(&list, 2).expect("index in bounds");
        assert_eq!(p[0], Hash256::compute(list[2].as_hash().as_bytes()));
        assert!(verify_path(&list[2], &p, 2, &root(&list)));
    }
}
