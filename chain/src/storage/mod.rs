// chain/src/storage/mod.rs

//! Content-addressed storage for the chain.
//!
//! This module defines the [`CidStore`] abstraction the chain is built on
//! and provides two backends:
//!
//! - an in-memory store ([`mem::MemoryCidStore`]) suitable for tests and
//!   simulations,
//! - a RocksDB-backed store ([`rocksdb::RocksDbCidStore`]) for persistent
//!   validator nodes.
//!
//! A `CidStore` has two regions: the content-addressed blob region keyed by
//! [`Cid`], and a small metadata region of named records (index roots, chain
//! head) that the chain overwrites in place.

use std::fmt;

use crate::types::Cid;

pub mod mem;
pub mod rocksdb;

pub use self::mem::MemoryCidStore;
pub use self::rocksdb::{RocksDbCidStore, RocksDbConfig};

/// Storage-level error type. Every variant is fatal to the current
/// operation and surfaces upward; callers never see partial writes.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying RocksDB error.
    RocksDb(::rocksdb::Error),
    /// Required column family was not found.
    MissingColumnFamily(&'static str),
    /// Corrupted or malformed metadata record.
    CorruptedMeta(&'static str),
    /// A blob was rewritten with different bytes under the same CID.
    ///
    /// CIDs are collision-resistant hashes of their content, so this can
    /// only happen when a caller computed the CID over the wrong bytes.
    CidMismatch(Cid),
}

impl From<::rocksdb::Error> for StorageError {
    fn from(e: ::rocksdb::Error) -> Self {
        StorageError::RocksDb(e)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::RocksDb(e) => write!(f, "rocksdb error: {e}"),
            StorageError::MissingColumnFamily(cf) => {
                write!(f, "missing column family: {cf}")
            }
            StorageError::CorruptedMeta(what) => write!(f, "corrupted metadata: {what}"),
            StorageError::CidMismatch(cid) => {
                write!(f, "divergent bytes rewritten under cid {}", cid.to_hex())
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// Abstract content-addressed store used by the chain.
///
/// The CID **must** be the canonical hash of the bytes; the store does not
/// recompute it and is trusted to be driven by correct callers. Writes are
/// atomic at the blob level: a failed put behaves as if it never happened.
pub trait CidStore {
    /// Persists a blob under its CID.
    ///
    /// Rewriting the same CID with identical bytes is a no-op success;
    /// rewriting with different bytes fails with
    /// [`StorageError::CidMismatch`].
    fn put(&mut self, cid: &Cid, bytes: &[u8]) -> Result<(), StorageError>;

    /// Overwrites a blob under its CID unconditionally.
    ///
    /// Only for blobs whose CID covers an immutable core with a mutable
    /// envelope around it: a block absorbing attestations keeps its CID
    /// while its stored bytes change. Everything else goes through
    /// [`CidStore::put`].
    fn replace(&mut self, cid: &Cid, bytes: &[u8]) -> Result<(), StorageError>;

    /// Fetches a blob by CID, if present.
    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>, StorageError>;

    /// Whether a blob exists under this CID.
    fn has(&self, cid: &Cid) -> Result<bool, StorageError> {
        Ok(self.get(cid)?.is_some())
    }

    /// Reads a named metadata record.
    fn get_meta(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Writes a named metadata record, overwriting any previous value.
    fn put_meta(&mut self, key: &[u8], bytes: &[u8]) -> Result<(), StorageError>;
}
