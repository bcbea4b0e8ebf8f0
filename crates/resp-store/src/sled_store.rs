//! The persistent backend, opened at the configured data directory.
//!
//! `sled` plays the role RocksDB plays in `original_source`: an embedded,
//! crash-safe, ordered byte-key store. Unlike RocksDB, `sled` has no native
//! read-only open mode, so `--readonly` (spec.md §6.2) is enforced here by
//! simply rejecting mutating calls rather than by how the database handle
//! was opened.

use std::path::Path;

use tracing::debug;

use crate::{Store, StoreError, StoreResult};

pub struct SledStore {
    db: sled::Db,
    /// When true, every write is followed by an explicit `flush`, the
    /// `--sync` flag's synchronous-write behavior (spec.md §6.2). Default is
    /// async: writes land in sled's write-ahead log and get batched out.
    sync: bool,
    readonly: bool,
}

impl SledStore {
    pub fn open(dir: &Path, sync: bool, readonly: bool) -> StoreResult<Self> {
        let db = sled::open(dir)?;
        debug!(?dir, sync, readonly, "opened sled store");
        Ok(Self { db, sync, readonly })
    }

    fn guard_writable(&self) -> StoreResult<()> {
        if self.readonly {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

impl Store for SledStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.guard_writable()?;
        self.db.insert(key, value)?;
        if self.sync {
            self.db.flush()?;
        }
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        self.guard_writable()?;
        let existed = self.db.remove(key)?.is_some();
        if self.sync {
            self.db.flush()?;
        }
        Ok(existed)
    }

    fn scan(&self, from: &[u8], limit: usize) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::with_capacity(limit.min(256));
        for item in self.db.range(from..) {
            if out.len() >= limit {
                break;
            }
            let (k, v) = item?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    fn flush(&self) -> StoreResult<()> {
        self.guard_writable()?;
        self.db.clear()?;
        self.db.flush()?;
        Ok(())
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }
}
