//! Key-value store adapters.

pub mod failing;
pub mod file;
pub mod memory;

pub use failing::{FailingKVStore, FailureSwitch};
pub use file::FileBackedKVStore;
pub use memory::InMemoryKVStore;
