//! Error types for the log engine.

use crate::domain::value_objects::{LogId, StatusCode};
use thiserror::Error;

/// All errors surfaced by log operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// Unknown log id.
    #[error("Log {0} not found")]
    LogNotFound(LogId),

    /// A requested leaf or hash does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Index or size outside the committed tree.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// The request is well formed but the tree is in the wrong state for it.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Log {0} is already initialized")]
    AlreadyInitialized(LogId),

    /// Protocol violation (negative counts, empty or oversized batches).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Another sequencing run holds the log.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Storage or signing failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LogError {
    pub fn code(&self) -> StatusCode {
        match self {
            LogError::LogNotFound(_) | LogError::NotFound(_) => StatusCode::NotFound,
            LogError::OutOfRange(_) => StatusCode::OutOfRange,
            LogError::FailedPrecondition(_) => StatusCode::FailedPrecondition,
            LogError::AlreadyInitialized(_) => StatusCode::AlreadyInitialized,
            LogError::InvalidArgument(_) => StatusCode::InvalidArgument,
            LogError::Unavailable(_) => StatusCode::Unavailable,
            LogError::Internal(_) => StatusCode::Internal,
        }
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

impl From<KVStoreError> for LogError {
    fn from(err: KVStoreError) -> Self {
        LogError::Internal(err.to_string())
    }
}

/// Signing capability errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid signature encoding")]
    InvalidSignature,

    #[error("Signature verification failed")]
    VerificationFailed,
}

impl From<SignerError> for LogError {
    fn from(err: SignerError) -> Self {
        LogError::Internal(err.to_string())
    }
}

/// Encoding and decoding of stored records and canonical roots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    #[error("Input truncated")]
    Truncated,

    #[error("Unsupported log root version {0}")]
    UnsupportedVersion(u16),

    #[error("Invalid {field} length: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} trailing bytes after log root")]
    TrailingBytes(usize),

    #[error("Record codec failure: {0}")]
    Codec(String),
}

impl From<bincode::Error> for SerializationError {
    fn from(err: bincode::Error) -> Self {
        SerializationError::Codec(err.to_string())
    }
}

impl From<SerializationError> for LogError {
    fn from(err: SerializationError) -> Self {
        LogError::Internal(err.to_string())
    }
}

/// Client-side proof verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Leaf index {index} is not below tree size {size}")]
    IndexOutOfRange { index: u64, size: u64 },

    #[error("Invalid sizes: first {first}, second {second}")]
    InvalidSizes { first: u64, second: u64 },

    #[error("Proof of {0} hashes has the wrong length for these sizes")]
    InvalidProofLength(usize),

    #[error("Computed root does not match")]
    RootMismatch,
}
