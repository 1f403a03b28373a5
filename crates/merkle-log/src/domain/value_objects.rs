//! Value objects for the log engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a SHA-256 digest in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte tree hash (leaf hash, node hash or root hash).
pub type Hash = [u8; HASH_SIZE];

/// Identifier of a single log (tree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogId(pub u64);

impl LogId {
    /// Big-endian bytes used inside storage keys.
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock time in nanoseconds since the Unix epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const NANOS_PER_SEC: u64 = 1_000_000_000;

    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(Self::NANOS_PER_SEC))
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Whole seconds elapsed from `earlier` to `self` (zero if `earlier` is later).
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0) / Self::NANOS_PER_SEC
    }
}

/// How leaf indices are assigned for a tree. Fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeMode {
    /// The sequencer assigns indices in arrival order.
    Log,
    /// Callers supply indices; the sequencer integrates them in order.
    PreorderedLog,
}

impl fmt::Display for TreeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeMode::Log => write!(f, "LOG"),
            TreeMode::PreorderedLog => write!(f, "PREORDERED_LOG"),
        }
    }
}

/// Lifecycle state of a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeState {
    /// Accepts writes.
    Active,
    /// Read-only. Never un-frozen.
    Frozen,
}

impl fmt::Display for TreeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeState::Active => write!(f, "ACTIVE"),
            TreeState::Frozen => write!(f, "FROZEN"),
        }
    }
}

/// Status codes surfaced to callers, both per-request and per-leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    NotFound,
    OutOfRange,
    AlreadyExists,
    FailedPrecondition,
    AlreadyInitialized,
    InvalidArgument,
    Unavailable,
    Internal,
}

impl StatusCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::OutOfRange => "OUT_OF_RANGE",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::AlreadyInitialized => "ALREADY_INITIALIZED",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// Coordinate of a complete subtree: `level` 0 is the leaves, and node
/// `index` at `level` covers leaves `[index << level, (index + 1) << level)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub level: u32,
    pub index: u64,
}

impl NodeId {
    pub fn new(level: u32, index: u64) -> Self {
        Self { level, index }
    }

    pub fn leaf(index: u64) -> Self {
        Self { level: 0, index }
    }
}

/// Run state of the per-log sequencer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SequencerState {
    #[default]
    Idle,
    Draining,
    Committing,
}
