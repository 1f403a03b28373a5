//! IPC Handler for the log API
//!
//! ## Boundary Checks
//!
//! - Negative ids, indices, sizes and counts are `InvalidArgument`
//! - Every failure is reported as an [`RpcStatus`](super::RpcStatus), never a panic
//! - Per-leaf outcomes of write calls ride inside an OK response

use crate::domain::entities::LogLeaf;
use crate::domain::errors::LogError;
use crate::domain::value_objects::{LogId, StatusCode};
use crate::ipc::payloads::{LeafPayload, LogRequest, LogResponse, ResponseBody};
use crate::ports::inbound::LogApi;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

fn non_negative(field: &str, value: i64) -> Result<u64, LogError> {
    u64::try_from(value)
        .map_err(|_| LogError::InvalidArgument(format!("{} must be non-negative, got {}", field, value)))
}

fn log_id(value: i64) -> Result<LogId, LogError> {
    non_negative("log_id", value).map(LogId)
}

fn into_leaf(payload: LeafPayload, with_index: bool) -> Result<LogLeaf, LogError> {
    let mut leaf = LogLeaf::new(payload.leaf_value).with_extra_data(payload.extra_data);
    if let Some(identity) = payload.leaf_identity_hash {
        leaf = leaf.with_identity_hash(identity);
    }
    if with_index {
        leaf = leaf.with_index(non_negative("leaf_index", payload.leaf_index)?);
    }
    Ok(leaf)
}

/// Translates wire requests into [`LogApi`] calls.
pub struct LogRequestHandler<A: LogApi> {
    api: Arc<A>,
}

impl<A: LogApi> LogRequestHandler<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Handle one request. Always returns a response.
    pub async fn handle(&self, request: LogRequest) -> LogResponse {
        let start_time = Instant::now();
        let method = request.method();

        match self.dispatch(request).await {
            Ok(body) => {
                debug!(
                    method,
                    elapsed_us = start_time.elapsed().as_micros() as u64,
                    "Request served"
                );
                LogResponse::ok(body)
            }
            Err(e) => {
                if e.code() == StatusCode::Internal {
                    error!(method, error = %e, "Request failed");
                } else {
                    warn!(method, code = %e.code(), error = %e, "Request rejected");
                }
                LogResponse::error(&e)
            }
        }
    }

    async fn dispatch(&self, request: LogRequest) -> Result<ResponseBody, LogError> {
        let api = self.api.as_ref();
        let body = match request {
            LogRequest::CreateTree { mode, display_name } => {
                ResponseBody::Tree(api.create_tree(mode, &display_name).await?)
            }
            LogRequest::GetTree { log_id: id } => {
                ResponseBody::Tree(api.get_tree(log_id(id)?).await?)
            }
            LogRequest::ListTrees => ResponseBody::Trees(api.list_trees().await?),
            LogRequest::SetTreeState { log_id: id, state } => {
                ResponseBody::Tree(api.set_tree_state(log_id(id)?, state).await?)
            }
            LogRequest::InitLog { log_id: id } => {
                ResponseBody::SignedRoot(api.init_log(log_id(id)?).await?)
            }
            LogRequest::QueueLeaf { log_id: id, leaf } => {
                let id = log_id(id)?;
                ResponseBody::QueuedLeaf(api.queue_leaf(id, into_leaf(leaf, false)?).await?)
            }
            LogRequest::QueueLeaves { log_id: id, leaves } => {
                let id = log_id(id)?;
                let leaves = leaves
                    .into_iter()
                    .map(|payload| into_leaf(payload, false))
                    .collect::<Result<Vec<_>, _>>()?;
                ResponseBody::QueuedLeaves(api.queue_leaves(id, leaves).await?)
            }
            LogRequest::AddSequencedLeaf { log_id: id, leaf } => {
                let id = log_id(id)?;
                let leaf = into_leaf(leaf, true)?;
                ResponseBody::QueuedLeaf(api.add_sequenced_leaf(id, leaf).await?)
            }
            LogRequest::AddSequencedLeaves { log_id: id, leaves } => {
                let id = log_id(id)?;
                let leaves = leaves
                    .into_iter()
                    .map(|payload| into_leaf(payload, true))
                    .collect::<Result<Vec<_>, _>>()?;
                ResponseBody::QueuedLeaves(api.add_sequenced_leaves(id, leaves).await?)
            }
            LogRequest::GetLeavesByIndex { log_id: id, indices } => {
                let id = log_id(id)?;
                let indices = indices
                    .into_iter()
                    .map(|index| non_negative("leaf_index", index))
                    .collect::<Result<Vec<_>, _>>()?;
                ResponseBody::Leaves(api.get_leaves_by_index(id, &indices).await?)
            }
            LogRequest::GetLeavesByRange {
                log_id: id,
                start,
                count,
            } => {
                let id = log_id(id)?;
                let start = non_negative("start", start)?;
                if count <= 0 {
                    return Err(LogError::InvalidArgument(format!(
                        "count must be positive, got {}",
                        count
                    )));
                }
                ResponseBody::Leaves(api.get_leaves_by_range(id, start, count as u64).await?)
            }
            LogRequest::GetLeavesByHash {
                log_id: id,
                leaf_hashes,
                order_by_sequence,
            } => ResponseBody::Leaves(
                api.get_leaves_by_hash(log_id(id)?, &leaf_hashes, order_by_sequence)
                    .await?,
            ),
            LogRequest::GetInclusionProof {
                log_id: id,
                leaf_index,
                tree_size,
            } => ResponseBody::Inclusion(
                api.get_inclusion_proof(
                    log_id(id)?,
                    non_negative("leaf_index", leaf_index)?,
                    non_negative("tree_size", tree_size)?,
                )
                .await?,
            ),
            LogRequest::GetInclusionProofByHash {
                log_id: id,
                leaf_hash,
                tree_size,
                order_by_sequence,
            } => ResponseBody::InclusionByHash(
                api.get_inclusion_proof_by_hash(
                    log_id(id)?,
                    &leaf_hash,
                    non_negative("tree_size", tree_size)?,
                    order_by_sequence,
                )
                .await?,
            ),
            LogRequest::GetConsistencyProof {
                log_id: id,
                first_tree_size,
                second_tree_size,
            } => ResponseBody::Consistency(
                api.get_consistency_proof(
                    log_id(id)?,
                    non_negative("first_tree_size", first_tree_size)?,
                    non_negative("second_tree_size", second_tree_size)?,
                )
                .await?,
            ),
            LogRequest::GetLatestSignedLogRoot {
                log_id: id,
                first_tree_size,
            } => ResponseBody::LatestRoot(
                api.get_latest_signed_log_root(
                    log_id(id)?,
                    non_negative("first_tree_size", first_tree_size)?,
                )
                .await?,
            ),
            LogRequest::GetSignedRootAt {
                log_id: id,
                tree_size,
            } => ResponseBody::SignedRoot(
                api.get_signed_root_at(log_id(id)?, non_negative("tree_size", tree_size)?)
                    .await?,
            ),
            LogRequest::GetSequencedLeafCount { log_id: id } => ResponseBody::LeafCount {
                count: api.get_sequenced_leaf_count(log_id(id)?).await?,
            },
            LogRequest::GetEntryAndProof {
                log_id: id,
                leaf_index,
                tree_size,
            } => ResponseBody::EntryAndProof(
                api.get_entry_and_proof(
                    log_id(id)?,
                    non_negative("leaf_index", leaf_index)?,
                    non_negative("tree_size", tree_size)?,
                )
                .await?,
            ),
        };
        Ok(body)
    }
}
