//! # Merkle Log
//!
//! Verifiable append-only log. Clients submit leaves; a single sequencer per
//! log assigns indices, extends an RFC 6962 Merkle tree and signs each new
//! root. Readers get inclusion and consistency proofs against signed roots.
//!
//! ## Architecture
//!
//! - **Domain**: Core entities (Tree, LogLeaf, LogRootV1, SignedLogRoot, proofs), errors, invariants
//! - **Algorithms**: RFC 6962 hashing, incremental tree builder, proof computer, client verifiers
//! - **Ports**: Inbound (LogApi) and Outbound (KeyValueStore, LogSigner, TimeSource)
//! - **Adapters**: In-memory and file-backed stores, Ed25519 signer, clocks, writer lease
//! - **Storage**: Keyed log records, conditional admission, atomic round commits
//! - **Application**: Root signer, sequencer, service orchestration
//! - **IPC**: Wire payloads and request handler
//!
//! ## Tree Modes
//!
//! - `LOG`: the sequencer assigns indices in arrival order, deduplicating by identity hash
//! - `PREORDERED_LOG`: callers supply indices; the sequencer integrates contiguous runs

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ipc;
pub mod ports;
pub mod storage;

pub use adapters::{verify_signed_root, Ed25519LogSigner, InMemoryKVStore, FileBackedKVStore};
pub use adapters::{ManualTimeSource, SystemTimeSource};
#[cfg(feature = "locking")]
pub use adapters::{LockError, SequencerLease};
pub use algorithms::{root_from_inclusion_proof, verify_consistency, verify_inclusion};
pub use application::{LogService, Sequencer, SequencingOutcome};
pub use config::LogConfig;
pub use domain::entities::*;
pub use domain::errors::{LogError, SignerError, VerificationError};
pub use domain::value_objects::*;
pub use ipc::{LogRequest, LogRequestHandler, LogResponse};
pub use ports::inbound::LogApi;
pub use ports::outbound::{KeyValueStore, LogSigner, TimeSource};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
