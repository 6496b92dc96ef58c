// chain/src/storage/mem.rs

//! In-memory content-addressed store.
//!
//! This implementation is useful for unit tests, benchmarks, and small
//! devnets. Blobs live in a `HashMap` keyed by [`Cid`]; the metadata region
//! is a second map keyed by record name.

use std::collections::HashMap;

use crate::storage::{CidStore, StorageError};
use crate::types::Cid;

/// In-memory implementation of [`CidStore`].
#[derive(Debug, Default)]
pub struct MemoryCidStore {
    blobs: HashMap<Cid, Vec<u8>>,
    meta: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryCidStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// `true` if no blobs are stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl CidStore for MemoryCidStore {
    fn put(&mut self, cid: &Cid, bytes: &[u8]) -> Result<(), StorageError> {
        match self.blobs.get(cid) {
            Some(existing) if existing.as_slice() == bytes => Ok(()),
            Some(_) => Err(StorageError::CidMismatch(*cid)),
            None => {
                self.blobs.insert(*cid, bytes.to_vec());
                Ok(())
            }
        }
    }

    fn replace(&mut self, cid: &Cid, bytes: &[u8]) -> Result<(), StorageError> {
        self.blobs.insert(*cid, bytes.to_vec());
        Ok(())
    }

    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.get(cid).cloned())
    }

    fn get_meta(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.meta.get(key).cloned())
    }

    fn put_meta(&mut self, key: &[u8], bytes: &[u8]) -> Result<(), StorageError> {
        self.meta.insert(key.to_vec(), bytes.to_vec());
        Ok(())
    }
}
