//! Application layer: root signing, sequencing and the log service.

pub mod root_signer;
pub mod sequencer;
pub mod service;

pub use root_signer::RootSigner;
pub use sequencer::{Sequencer, SequencingOutcome};
pub use service::LogService;
