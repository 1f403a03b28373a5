//! Storage backend selected at startup.

use crate::config::{NodeConfig, StorageBackend};
use merkle_log::domain::errors::KVStoreError;
use merkle_log::ports::{BatchOperation, ScanResult};
use merkle_log::{FileBackedKVStore, InMemoryKVStore, KeyValueStore};

/// File name of the log records inside the data directory.
pub const STORE_FILE: &str = "log.db";

pub enum NodeStore {
    Memory(InMemoryKVStore),
    File(FileBackedKVStore),
}

impl NodeStore {
    pub fn open(config: &NodeConfig) -> Result<Self, KVStoreError> {
        match config.storage {
            StorageBackend::Memory => Ok(Self::Memory(InMemoryKVStore::new())),
            StorageBackend::File => {
                let store = FileBackedKVStore::open(config.data_dir.join(STORE_FILE))?;
                Ok(Self::File(store))
            }
        }
    }

    fn inner(&self) -> &dyn KeyValueStore {
        match self {
            Self::Memory(store) => store,
            Self::File(store) => store,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn KeyValueStore {
        match self {
            Self::Memory(store) => store,
            Self::File(store) => store,
        }
    }
}

impl KeyValueStore for NodeStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.inner().get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.inner_mut().put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.inner_mut().delete(key)
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.inner_mut().atomic_batch_write(operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.inner().exists(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        self.inner().prefix_scan(prefix)
    }

    fn prefix_scan_limit(&self, prefix: &[u8], limit: usize) -> Result<ScanResult, KVStoreError> {
        self.inner().prefix_scan_limit(prefix, limit)
    }
}
