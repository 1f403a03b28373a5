//! # Outbound Ports (Driven Ports)
//!
//! Collaborators the log engine requires from its host: durable ordered
//! key-value storage, a signing capability and a clock.

use crate::domain::errors::{KVStoreError, SignerError};
use crate::domain::value_objects::Timestamp;

/// Key/value pairs returned by scans, in ascending key order.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Abstract interface for ordered key-value database operations.
///
/// Production: `FileBackedKVStore`
/// Testing: `InMemoryKVStore`
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, or NONE are.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// All pairs whose key starts with `prefix`, in ascending key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError>;

    /// The first `limit` pairs of [`prefix_scan`](Self::prefix_scan).
    fn prefix_scan_limit(&self, prefix: &[u8], limit: usize) -> Result<ScanResult, KVStoreError> {
        let mut results = self.prefix_scan(prefix)?;
        results.truncate(limit);
        Ok(results)
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Signing capability for log roots. Key custody stays with the implementor.
pub trait LogSigner: Send + Sync {
    /// Sign the canonical log root bytes.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError>;

    /// Public key clients use to check root signatures.
    fn public_key(&self) -> Vec<u8>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current time in nanoseconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}
