//! IPC Payloads for the log API
//!
//! Wire shapes for RPC front-ends. Integer fields are signed as they arrive
//! from protobuf/JSON clients; the handler rejects negative values before
//! anything reaches the service.

use crate::domain::entities::{
    ConsistencyResult, EntryAndProof, InclusionByHashResult, InclusionResult, LatestRootResult,
    LogLeaf, QueuedLogLeaf, SignedLogRoot, Tree,
};
use crate::domain::errors::LogError;
use crate::domain::value_objects::{Hash, StatusCode, TreeMode, TreeState};
use serde::{Deserialize, Serialize};

// ============================================================
// INCOMING REQUESTS
// ============================================================

/// A leaf as submitted by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeafPayload {
    pub leaf_value: Vec<u8>,
    #[serde(default)]
    pub extra_data: Vec<u8>,
    /// Required by the pre-ordered writes, ignored by the queued ones.
    #[serde(default)]
    pub leaf_index: i64,
    /// Defaults to the Merkle leaf hash when absent.
    #[serde(default)]
    pub leaf_identity_hash: Option<Hash>,
}

/// Every request the log answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum LogRequest {
    CreateTree {
        mode: TreeMode,
        display_name: String,
    },
    GetTree {
        log_id: i64,
    },
    ListTrees,
    SetTreeState {
        log_id: i64,
        state: TreeState,
    },
    InitLog {
        log_id: i64,
    },
    QueueLeaf {
        log_id: i64,
        leaf: LeafPayload,
    },
    QueueLeaves {
        log_id: i64,
        leaves: Vec<LeafPayload>,
    },
    AddSequencedLeaf {
        log_id: i64,
        leaf: LeafPayload,
    },
    AddSequencedLeaves {
        log_id: i64,
        leaves: Vec<LeafPayload>,
    },
    GetLeavesByIndex {
        log_id: i64,
        indices: Vec<i64>,
    },
    GetLeavesByRange {
        log_id: i64,
        start: i64,
        count: i64,
    },
    GetLeavesByHash {
        log_id: i64,
        leaf_hashes: Vec<Hash>,
        #[serde(default)]
        order_by_sequence: bool,
    },
    GetInclusionProof {
        log_id: i64,
        leaf_index: i64,
        tree_size: i64,
    },
    GetInclusionProofByHash {
        log_id: i64,
        leaf_hash: Hash,
        tree_size: i64,
        #[serde(default)]
        order_by_sequence: bool,
    },
    GetConsistencyProof {
        log_id: i64,
        first_tree_size: i64,
        second_tree_size: i64,
    },
    GetLatestSignedLogRoot {
        log_id: i64,
        #[serde(default)]
        first_tree_size: i64,
    },
    GetSignedRootAt {
        log_id: i64,
        tree_size: i64,
    },
    GetSequencedLeafCount {
        log_id: i64,
    },
    GetEntryAndProof {
        log_id: i64,
        leaf_index: i64,
        tree_size: i64,
    },
}

impl LogRequest {
    /// Method name for logging.
    pub fn method(&self) -> &'static str {
        match self {
            Self::CreateTree { .. } => "CreateTree",
            Self::GetTree { .. } => "GetTree",
            Self::ListTrees => "ListTrees",
            Self::SetTreeState { .. } => "SetTreeState",
            Self::InitLog { .. } => "InitLog",
            Self::QueueLeaf { .. } => "QueueLeaf",
            Self::QueueLeaves { .. } => "QueueLeaves",
            Self::AddSequencedLeaf { .. } => "AddSequencedLeaf",
            Self::AddSequencedLeaves { .. } => "AddSequencedLeaves",
            Self::GetLeavesByIndex { .. } => "GetLeavesByIndex",
            Self::GetLeavesByRange { .. } => "GetLeavesByRange",
            Self::GetLeavesByHash { .. } => "GetLeavesByHash",
            Self::GetInclusionProof { .. } => "GetInclusionProof",
            Self::GetInclusionProofByHash { .. } => "GetInclusionProofByHash",
            Self::GetConsistencyProof { .. } => "GetConsistencyProof",
            Self::GetLatestSignedLogRoot { .. } => "GetLatestSignedLogRoot",
            Self::GetSignedRootAt { .. } => "GetSignedRootAt",
            Self::GetSequencedLeafCount { .. } => "GetSequencedLeafCount",
            Self::GetEntryAndProof { .. } => "GetEntryAndProof",
        }
    }
}

// ============================================================
// OUTGOING RESPONSES
// ============================================================

/// Canonical status carried by every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: StatusCode,
    pub message: Option<String>,
}

impl RpcStatus {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
        }
    }
}

impl From<&LogError> for RpcStatus {
    fn from(e: &LogError) -> Self {
        Self {
            code: e.code(),
            message: Some(e.to_string()),
        }
    }
}

/// Successful response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ResponseBody {
    Tree(Tree),
    Trees(Vec<Tree>),
    SignedRoot(SignedLogRoot),
    QueuedLeaf(QueuedLogLeaf),
    /// One entry per submitted leaf, with its own status.
    QueuedLeaves(Vec<QueuedLogLeaf>),
    Leaves(Vec<LogLeaf>),
    Inclusion(InclusionResult),
    InclusionByHash(InclusionByHashResult),
    Consistency(ConsistencyResult),
    LatestRoot(LatestRootResult),
    LeafCount { count: u64 },
    EntryAndProof(EntryAndProof),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogResponse {
    pub status: RpcStatus,
    pub body: Option<ResponseBody>,
}

impl LogResponse {
    pub fn ok(body: ResponseBody) -> Self {
        Self {
            status: RpcStatus::ok(),
            body: Some(body),
        }
    }

    pub fn error(e: &LogError) -> Self {
        Self {
            status: RpcStatus::from(e),
            body: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.code.is_ok()
    }
}
