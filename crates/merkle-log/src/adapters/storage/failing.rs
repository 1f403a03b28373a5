use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore, ScanResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared switch controlling a [`FailingKVStore`] after it has been moved into
/// a service.
#[derive(Clone, Default)]
pub struct FailureSwitch {
    fail_writes: Arc<AtomicBool>,
    failed_batches: Arc<AtomicUsize>,
}

impl FailureSwitch {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of batches rejected so far.
    pub fn failed_batches(&self) -> usize {
        self.failed_batches.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        if self.fail_writes.load(Ordering::SeqCst) {
            self.failed_batches.fetch_add(1, Ordering::SeqCst);
            return true;
        }
        false
    }
}

/// Fault-injection wrapper: while the switch is on, every write is rejected
/// before reaching the inner store. Reads always pass through.
pub struct FailingKVStore<KV: KeyValueStore> {
    inner: KV,
    switch: FailureSwitch,
}

impl<KV: KeyValueStore> FailingKVStore<KV> {
    pub fn new(inner: KV) -> (Self, FailureSwitch) {
        let switch = FailureSwitch::default();
        (
            Self {
                inner,
                switch: switch.clone(),
            },
            switch,
        )
    }

    fn injected() -> KVStoreError {
        KVStoreError::IOError {
            message: "injected write failure".to_string(),
        }
    }
}

impl<KV: KeyValueStore> KeyValueStore for FailingKVStore<KV> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.inner.get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        if self.switch.should_fail() {
            return Err(Self::injected());
        }
        self.inner.put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        if self.switch.should_fail() {
            return Err(Self::injected());
        }
        self.inner.delete(key)
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        if self.switch.should_fail() {
            return Err(Self::injected());
        }
        self.inner.atomic_batch_write(operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.inner.exists(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        self.inner.prefix_scan(prefix)
    }

    fn prefix_scan_limit(&self, prefix: &[u8], limit: usize) -> Result<ScanResult, KVStoreError> {
        self.inner.prefix_scan_limit(prefix, limit)
    }
}
