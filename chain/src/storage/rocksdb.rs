// chain/src/storage/rocksdb.rs

//! RocksDB-backed content-addressed store.
//!
//! This implementation persists blobs and chain metadata in a RocksDB
//! instance with dedicated column families:
//!
//! - `"blobs"`: maps [`Cid`] (32 bytes) -> blob bytes,
//! - `"meta"`:  named records (index roots, chain head) overwritten in place.
//!
//! RocksDB single-key writes go through the WAL, which gives the blob-level
//! atomicity the chain requires: a put either lands completely or not at all.

use std::{path::Path, sync::Arc};

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};

type DB = DBWithThreadMode<MultiThreaded>;

use crate::storage::{CidStore, StorageError};
use crate::types::Cid;

/// Configuration for [`RocksDbCidStore`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/poj-chain-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed implementation of [`CidStore`].
pub struct RocksDbCidStore {
    db: DB,
}

impl RocksDbCidStore {
    /// Opens (or creates) a RocksDB-backed store at the configured path.
    ///
    /// This sets up the `"blobs"` and `"meta"` column families. The
    /// `"default"` column family is also created to keep RocksDB happy,
    /// but it is not otherwise used.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new("blobs", Options::default()),
            ColumnFamilyDescriptor::new("meta", Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self { db })
    }

    fn cf_blobs(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle("blobs")
            .ok_or(StorageError::MissingColumnFamily("blobs"))
    }

    fn cf_meta(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle("meta")
            .ok_or(StorageError::MissingColumnFamily("meta"))
    }
}

impl CidStore for RocksDbCidStore {
    fn put(&mut self, cid: &Cid, bytes: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf_blobs()?;
        let key = cid.as_hash().as_bytes();
        if let Some(existing) = self.db.get_cf(&cf, key)? {
            if existing.as_slice() == bytes {
                return Ok(());
            }
            return Err(StorageError::CidMismatch(*cid));
        }
        self.db.put_cf(&cf, key, bytes)?;
        Ok(())
    }

    fn replace(&mut self, cid: &Cid, bytes: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf_blobs()?;
        self.db.put_cf(&cf, cid.as_hash().as_bytes(), bytes)?;
        Ok(())
    }

    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf_blobs()?;
        Ok(self.db.get_cf(&cf, cid.as_hash().as_bytes())?)
    }

    fn get_meta(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf_meta()?;
        Ok(self.db.get_cf(&cf, key)?)
    }

    fn put_meta(&mut self, key: &[u8], bytes: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf_meta()?;
        self.db.put_cf(&cf, key, bytes)?;
        Ok(())
    }
}
