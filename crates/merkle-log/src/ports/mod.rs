//! Ports (hexagonal architecture boundaries).

pub mod inbound;
pub mod outbound;

pub use inbound::LogApi;
pub use outbound::{BatchOperation, KeyValueStore, LogSigner, ScanResult, TimeSource};
