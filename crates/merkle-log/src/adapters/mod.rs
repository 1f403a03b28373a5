//! Adapters implementing the outbound ports.

pub mod infra;
#[cfg(feature = "locking")]
pub mod lock;
pub mod signer;
pub mod storage;

pub use infra::{ManualTimeSource, SystemTimeSource};
#[cfg(feature = "locking")]
pub use lock::{LockError, SequencerLease};
pub use signer::{verify_signed_root, Ed25519LogSigner};
pub use storage::{FailingKVStore, FailureSwitch, FileBackedKVStore, InMemoryKVStore};
