//! # Sequencer
//!
//! Single writer per log. One run drains pending leaves, assigns or validates
//! indices, extends the tree and commits a new signed root.
//!
//! ## Run States
//!
//! `Idle -> Draining -> Committing -> Idle`. A per-log mutex allows exactly
//! one active run per log inside the process; [`SequencerLease`] extends that
//! across processes.
//!
//! ## Failure
//!
//! A run writes nothing until its single atomic commit. If that commit fails
//! the pending queue is untouched and the next run retries the same leaves.
//!
//! [`SequencerLease`]: crate::adapters::SequencerLease

use crate::algorithms::tree_builder::TreeBuilder;
use crate::application::root_signer::RootSigner;
use crate::config::LogConfig;
use crate::domain::entities::{LogLeaf, SignedLogRoot};
use crate::domain::errors::LogError;
use crate::domain::value_objects::{Hash, LogId, SequencerState, Timestamp, TreeMode};
use crate::ports::outbound::{KeyValueStore, TimeSource};
use crate::storage::{IdentityRecord, LeafStore, RoundCommit};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of one sequencing run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequencingOutcome {
    pub leaves_integrated: usize,
    /// Transient duplicate queue entries dropped without an index.
    pub duplicates_collapsed: usize,
    /// Tree size after the run.
    pub tree_size: u64,
    /// Whether a new root was signed (new leaves or a timestamp refresh).
    pub root_signed: bool,
}

struct Drained {
    integrated: Vec<LogLeaf>,
    drained_queue: Vec<u64>,
    drained_pending: Vec<u64>,
    collapsed: usize,
}

/// Per-log run lock plus the state of the run holding it.
#[derive(Default)]
struct RunSlot {
    run: Mutex<()>,
    state: Mutex<SequencerState>,
}

impl RunSlot {
    fn enter(&self, state: SequencerState) {
        *self.state.lock() = state;
    }
}

pub struct Sequencer<KV: KeyValueStore> {
    store: Arc<LeafStore<KV>>,
    root_signer: Arc<RootSigner<KV>>,
    clock: Arc<dyn TimeSource>,
    config: LogConfig,
    runs: Mutex<HashMap<LogId, Arc<RunSlot>>>,
}

impl<KV: KeyValueStore> Sequencer<KV> {
    pub fn new(
        store: Arc<LeafStore<KV>>,
        root_signer: Arc<RootSigner<KV>>,
        clock: Arc<dyn TimeSource>,
        config: LogConfig,
    ) -> Self {
        Self {
            store,
            root_signer,
            clock,
            config,
            runs: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, log_id: LogId) -> Arc<RunSlot> {
        self.runs.lock().entry(log_id).or_default().clone()
    }

    /// Where the current run for `log_id` is; `Idle` when none is active.
    pub fn state(&self, log_id: LogId) -> SequencerState {
        self.runs
            .lock()
            .get(&log_id)
            .map(|slot| *slot.state.lock())
            .unwrap_or_default()
    }

    /// Run one round for `log_id`, waiting for any active run to finish.
    pub fn sequence(&self, log_id: LogId) -> Result<SequencingOutcome, LogError> {
        let slot = self.slot(log_id);
        let _run = slot.run.lock();
        self.run(log_id, &slot)
    }

    /// Run one round unless another run holds the log (`Unavailable`).
    pub fn try_sequence(&self, log_id: LogId) -> Result<SequencingOutcome, LogError> {
        let slot = self.slot(log_id);
        let _run = slot.run.try_lock().ok_or_else(|| {
            LogError::Unavailable(format!("log {} is already being sequenced", log_id))
        })?;
        self.run(log_id, &slot)
    }

    /// One round for every ACTIVE, initialised tree. A failing log does not
    /// stop the others.
    pub fn sequence_all(&self) -> Result<Vec<(LogId, Result<SequencingOutcome, LogError>)>, LogError> {
        let mut outcomes = Vec::new();
        for tree in self.store.list_trees()? {
            if tree.is_frozen() || self.store.latest_root(tree.log_id)?.is_none() {
                continue;
            }
            let outcome = self.try_sequence(tree.log_id);
            if let Err(e) = &outcome {
                warn!(log_id = %tree.log_id, error = %e, "Sequencing round failed");
            }
            outcomes.push((tree.log_id, outcome));
        }
        Ok(outcomes)
    }

    fn run(&self, log_id: LogId, slot: &RunSlot) -> Result<SequencingOutcome, LogError> {
        let result = self.run_round(log_id, slot);
        slot.enter(SequencerState::Idle);
        result
    }

    fn run_round(&self, log_id: LogId, slot: &RunSlot) -> Result<SequencingOutcome, LogError> {
        let tree = self
            .store
            .get_tree(log_id)?
            .ok_or(LogError::LogNotFound(log_id))?;
        let latest = self.root_signer.get_latest(log_id)?;
        let size = latest.tree_size();

        if tree.is_frozen() {
            return Ok(SequencingOutcome {
                tree_size: size,
                ..Default::default()
            });
        }

        slot.enter(SequencerState::Draining);
        let now = self.clock.now();
        let drained = match tree.mode {
            TreeMode::Log => self.drain_queue(log_id, size, now)?,
            TreeMode::PreorderedLog => self.drain_pending(log_id, size, now)?,
        };

        if drained.integrated.is_empty() {
            if !drained.drained_queue.is_empty() {
                self.store.discard_queued(log_id, &drained.drained_queue)?;
            }
            let mut outcome = self.maybe_refresh(log_id, &latest, now)?;
            outcome.duplicates_collapsed = drained.collapsed;
            return Ok(outcome);
        }

        let hashes: Vec<Hash> = drained
            .integrated
            .iter()
            .map(|leaf| leaf.merkle_leaf_hash)
            .collect();
        let reader = self.store.node_reader(log_id);
        let mut builder = TreeBuilder::new(&reader);
        let nodes = builder.extend(size, &hashes)?;
        let new_size = size + hashes.len() as u64;
        let root_hash = builder.root_at(new_size)?;

        let root = self.root_signer.sign(new_size, root_hash, Some(&latest))?;

        slot.enter(SequencerState::Committing);
        let commit = RoundCommit {
            mode: tree.mode,
            integrated: drained.integrated,
            drained_queue: drained.drained_queue,
            drained_pending: drained.drained_pending,
            nodes,
            root,
            base_revision: latest.revision(),
        };

        if let Err(e) = self.store.commit_round(log_id, &commit) {
            error!(
                log_id = %log_id,
                tree_size = size,
                pending = commit.integrated.len(),
                error = %e,
                "Sequencing commit failed, pending leaves left for retry"
            );
            return Err(e);
        }

        info!(
            log_id = %log_id,
            count = commit.integrated.len(),
            tree_size = new_size,
            revision = commit.root.revision(),
            "Sequencing round committed"
        );

        Ok(SequencingOutcome {
            leaves_integrated: commit.integrated.len(),
            duplicates_collapsed: drained.collapsed,
            tree_size: new_size,
            root_signed: true,
        })
    }

    /// LOG mode: queued leaves in arrival order get `size, size + 1, ...`.
    fn drain_queue(&self, log_id: LogId, size: u64, now: Timestamp) -> Result<Drained, LogError> {
        let batch = self
            .store
            .queued_leaves(log_id, self.config.sequencer_batch_size)?;

        let mut seen: HashSet<Hash> = HashSet::with_capacity(batch.len());
        let mut drained = Drained {
            integrated: Vec::with_capacity(batch.len()),
            drained_queue: Vec::with_capacity(batch.len()),
            drained_pending: Vec::new(),
            collapsed: 0,
        };

        for (seq, mut leaf) in batch {
            drained.drained_queue.push(seq);

            let duplicate = !seen.insert(leaf.leaf_identity_hash)
                || match self.store.identity_record(log_id, &leaf.leaf_identity_hash)? {
                    Some(IdentityRecord::Queued(owner)) => owner != seq,
                    Some(IdentityRecord::Integrated(_)) => true,
                    None => false,
                };
            if duplicate {
                warn!(
                    log_id = %log_id,
                    seq,
                    identity = %hex::encode(leaf.leaf_identity_hash),
                    "Collapsing duplicate queued leaf"
                );
                drained.collapsed += 1;
                continue;
            }

            leaf.leaf_index = Some(size + drained.integrated.len() as u64);
            leaf.integrate_timestamp = Some(now);
            drained.integrated.push(leaf);
        }

        debug!(
            log_id = %log_id,
            drained = drained.drained_queue.len(),
            integrating = drained.integrated.len(),
            "Queue drained"
        );
        Ok(drained)
    }

    /// PREORDERED_LOG mode: integrate the contiguous pending run at `size`.
    fn drain_pending(&self, log_id: LogId, size: u64, now: Timestamp) -> Result<Drained, LogError> {
        let run = self
            .store
            .pending_run(log_id, size, self.config.sequencer_batch_size)?;

        let mut drained = Drained {
            integrated: Vec::with_capacity(run.len()),
            drained_queue: Vec::new(),
            drained_pending: Vec::with_capacity(run.len()),
            collapsed: 0,
        };

        for (offset, mut leaf) in run.into_iter().enumerate() {
            let index = size + offset as u64;
            if leaf.leaf_index != Some(index) {
                return Err(LogError::Internal(format!(
                    "pending leaf stored at {} claims index {:?}",
                    index, leaf.leaf_index
                )));
            }
            leaf.integrate_timestamp = Some(now);
            drained.drained_pending.push(index);
            drained.integrated.push(leaf);
        }

        Ok(drained)
    }

    fn maybe_refresh(
        &self,
        log_id: LogId,
        latest: &SignedLogRoot,
        now: Timestamp,
    ) -> Result<SequencingOutcome, LogError> {
        let max_age = self.config.max_root_duration_secs;
        let stale = max_age > 0 && now.secs_since(latest.timestamp()) >= max_age;

        if !stale {
            return Ok(SequencingOutcome {
                tree_size: latest.tree_size(),
                ..Default::default()
            });
        }

        let root = self.root_signer.refresh(log_id, latest)?;
        Ok(SequencingOutcome {
            tree_size: root.tree_size(),
            root_signed: true,
            ..Default::default()
        })
    }
}
