//! # Sequencer Lease
//!
//! Cross-process exclusivity for sequencing. Per-log mutexes only serialise
//! runs inside one process; two signer processes pointed at the same data
//! directory would both extend the same trees. The lease is an exclusive
//! advisory lock on a `SEQUENCER.LOCK` file, held for the life of the process.
//!
//! Readers never take the lease.
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on Windows).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Failed to create lock file: {0}")]
    CreateFailed(io::Error),

    #[error("Sequencer lease already held by {} ({})", describe_holder(.pid), .path.display())]
    AlreadyLocked { pid: Option<u32>, path: PathBuf },

    #[error("Failed to write PID to lock file: {0}")]
    WriteFailed(io::Error),
}

fn describe_holder(pid: &Option<u32>) -> String {
    match pid {
        Some(pid) => format!("process {}", pid),
        None => "another process".to_string(),
    }
}

/// Exclusive sequencing lease on a data directory. Released on drop.
pub struct SequencerLease {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl SequencerLease {
    const LOCK_FILE: &'static str = "SEQUENCER.LOCK";

    /// Acquire the lease without blocking.
    ///
    /// # Errors
    ///
    /// `LockError::AlreadyLocked` if another process holds it.
    pub fn acquire(data_dir: &Path) -> Result<Self, LockError> {
        std::fs::create_dir_all(data_dir).map_err(LockError::CreateFailed)?;
        let lock_path = data_dir.join(Self::LOCK_FILE);

        // Do not truncate before holding the lock: the holder's PID must survive
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(LockError::CreateFailed)?;

        if file.try_lock_exclusive().is_err() {
            let mut content = String::new();
            let pid = file
                .read_to_string(&mut content)
                .ok()
                .and_then(|_| content.trim().parse().ok());
            return Err(LockError::AlreadyLocked {
                pid,
                path: lock_path,
            });
        }

        let pid = std::process::id();
        file.set_len(0).map_err(LockError::WriteFailed)?;
        writeln!(file, "{}", pid).map_err(LockError::WriteFailed)?;
        file.sync_all().map_err(LockError::WriteFailed)?;

        info!(path = %lock_path.display(), pid, "Sequencer lease acquired");

        Ok(Self {
            file,
            path: lock_path,
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SequencerLease {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}
