//! `--inmem` backend: a `BTreeMap` behind a `parking_lot::RwLock`.
//!
//! Used for the inline execution mode (spec.md §4.4.1). Reads and writes
//! here never block on I/O, so it's sound to run command handlers directly
//! on the event loop thread.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::{Store, StoreResult};

#[derive(Default)]
pub struct MemStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.map.write().remove(key).is_some())
    }

    fn scan(&self, from: &[u8], limit: usize) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let guard = self.map.read();
        Ok(guard
            .range(from.to_vec()..)
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn flush(&self) -> StoreResult<()> {
        self.map.write().clear();
        Ok(())
    }

    fn is_readonly(&self) -> bool {
        false
    }
}
