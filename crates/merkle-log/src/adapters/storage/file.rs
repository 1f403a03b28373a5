use crate::adapters::storage::memory::{apply, scan};
use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore, ScanResult};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File-backed ordered key-value store.
///
/// The whole map lives in memory and is rewritten to disk on every write
/// through a temp file and an atomic rename. A batch is staged on a copy and
/// only becomes visible once the new file is durable, so a failed write leaves
/// both the file and the in-memory view untouched.
///
/// File format: repeated `[key_len:u32 LE][key][value_len:u32 LE][value]`.
pub struct FileBackedKVStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    path: PathBuf,
}

impl FileBackedKVStore {
    /// Open the store at `path`, loading any existing contents.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();

        let data = match std::fs::File::open(&path) {
            Ok(mut file) => {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).map_err(io_error)?;
                let data = Self::decode(&bytes)?;
                info!(
                    path = %path.display(),
                    keys = data.len(),
                    bytes = bytes.len(),
                    "Loaded log storage file"
                );
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No existing storage file, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(io_error(e)),
        };

        Ok(Self { data, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(bytes: &[u8]) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, KVStoreError> {
        let mut data = BTreeMap::new();
        let mut cursor = 0usize;

        while cursor < bytes.len() {
            let key = Self::read_chunk(bytes, &mut cursor)?;
            let value = Self::read_chunk(bytes, &mut cursor)?;
            data.insert(key, value);
        }

        Ok(data)
    }

    fn read_chunk(bytes: &[u8], cursor: &mut usize) -> Result<Vec<u8>, KVStoreError> {
        let truncated = || KVStoreError::CorruptionError {
            message: format!("truncated record at offset {}", cursor),
        };
        let len_end = cursor.checked_add(4).filter(|e| *e <= bytes.len());
        let len_end = len_end.ok_or_else(truncated)?;
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&bytes[*cursor..len_end]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        let end = len_end.checked_add(len).filter(|e| *e <= bytes.len());
        let end = end.ok_or_else(truncated)?;
        let chunk = bytes[len_end..end].to_vec();
        *cursor = end;
        Ok(chunk)
    }

    fn encode(data: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<Vec<u8>, KVStoreError> {
        let mut bytes = Vec::new();
        for (key, value) in data {
            bytes.extend_from_slice(&frame_len(key.len())?);
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(&frame_len(value.len())?);
            bytes.extend_from_slice(value);
        }
        Ok(bytes)
    }

    fn save(&self, data: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<(), KVStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let bytes = Self::encode(data)?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        std::fs::rename(&temp_path, &self.path).map_err(io_error)?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Storage file rewritten");
        Ok(())
    }

    fn commit(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut staged = self.data.clone();
        apply(&mut staged, operations);
        self.save(&staged)?;
        self.data = staged;
        Ok(())
    }
}

/// Entries are framed with a little-endian `u32` length.
fn frame_len(len: usize) -> Result<[u8; 4], KVStoreError> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| KVStoreError::IOError {
            message: format!("entry of {} bytes does not fit a storage frame", len),
        })
}

fn io_error(e: std::io::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: e.to_string(),
    }
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.commit(vec![BatchOperation::put(key, value)])
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.commit(vec![BatchOperation::delete(key)])
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.commit(operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        Ok(scan(&self.data, prefix, usize::MAX))
    }

    fn prefix_scan_limit(&self, prefix: &[u8], limit: usize) -> Result<ScanResult, KVStoreError> {
        Ok(scan(&self.data, prefix, limit))
    }
}
