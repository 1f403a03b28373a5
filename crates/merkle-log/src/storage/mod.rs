//! Log records over a key-value store.

pub mod keys;
pub mod leaf_store;

pub use keys::KeyPrefix;
pub use leaf_store::{IdentityRecord, LeafStore, LogNodeReader, RoundCommit};
