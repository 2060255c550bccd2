//! Block production cycle
//!
//! One producer, one cycle at a time. A cycle reads the chain tip and the
//! oldest pending transactions, applies them strictly in order against a
//! workspace overlay, seals the block, and commits everything through a
//! single store call conditioned on the tip not having moved. Individual
//! transactions fail without aborting the cycle; the cycle itself aborts
//! only on store failure, a missing genesis, or a lost tip race.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tally_core::{Block, TransactionStatus};
use tally_store::{CycleCommit, StateStore, StatusUpdate};

use crate::clock::Clock;
use crate::config::ProducerConfig;
use crate::error::EngineError;
use crate::executor::{self, ExecError};
use crate::linker::{ChainLinker, SealParams};
use crate::workspace::{CycleContext, CycleWorkspace};

/// Where in the cycle a store or encoding failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Reading the chain tip.
    FetchTip,
    /// Reading the pending batch.
    FetchBatch,
    /// Applying the batch to the workspace.
    Apply,
    /// Sealing the block.
    Link,
    /// Writing the cycle to the store.
    Commit,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::FetchTip => "fetch-tip",
            Self::FetchBatch => "fetch-batch",
            Self::Apply => "apply",
            Self::Link => "link",
            Self::Commit => "commit",
        };
        f.write_str(phase)
    }
}

/// Result of a production cycle that did not fail.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A block was sealed and committed.
    Sealed(Block),
    /// The queue was empty; no block was produced.
    NoPending,
}

/// Drives production cycles against a store.
///
/// The producer holds an exclusive lease: concurrent
/// [`produce_block`](Self::produce_block) calls queue behind an async
/// mutex rather than racing. Protection against a *second* producer
/// process comes from the commit condition, not from the lease.
pub struct BlockProducer {
    store: Arc<dyn StateStore>,
    linker: ChainLinker,
    clock: Arc<dyn Clock>,
    config: ProducerConfig,
    lease: Mutex<()>,
}

impl BlockProducer {
    /// Producer over the given store, linker, and clock.
    pub fn new(
        store: Arc<dyn StateStore>,
        linker: ChainLinker,
        clock: Arc<dyn Clock>,
        config: ProducerConfig,
    ) -> Self {
        Self {
            store,
            linker,
            clock,
            config,
            lease: Mutex::new(()),
        }
    }

    /// Run one production cycle.
    ///
    /// Returns [`CycleOutcome::NoPending`] when the queue is empty. On
    /// [`EngineError::Conflict`] the store is untouched and the call may
    /// be retried.
    pub async fn produce_block(&self) -> Result<CycleOutcome, EngineError> {
        let _lease = self.lease.lock().await;
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> Result<CycleOutcome, EngineError> {
        let tip = self
            .store
            .latest_block()
            .await
            .map_err(|source| EngineError::store(CyclePhase::FetchTip, source))?
            .ok_or(EngineError::MissingGenesis)?;

        let batch = self
            .store
            .pending_transactions(self.config.batch_limit)
            .await
            .map_err(|source| EngineError::store(CyclePhase::FetchBatch, source))?;
        if batch.is_empty() {
            debug!(tip = tip.height, "no pending transactions");
            return Ok(CycleOutcome::NoPending);
        }

        let height = tip.height + 1;
        let timestamp = self.clock.now();
        let ctx = CycleContext { height, timestamp };
        let mut workspace = CycleWorkspace::new(self.store.clone());
        let mut statuses = Vec::with_capacity(batch.len());
        let mut included = Vec::with_capacity(batch.len());
        let mut gas_total = 0u64;

        for tx in &batch {
            included.push(tx.id);
            match executor::execute(tx, &mut workspace, &ctx).await {
                Ok(applied) => {
                    gas_total += applied.gas_used;
                    debug!(id = %tx.id, kind = %tx.kind, gas = applied.gas_used, "confirmed");
                    statuses.push(StatusUpdate {
                        id: tx.id,
                        status: TransactionStatus::Confirmed,
                        block_height: height,
                        gas_used: applied.gas_used,
                        confirmed_at: Some(timestamp),
                    });
                }
                Err(ExecError::Validation(reason)) => {
                    warn!(id = %tx.id, kind = %tx.kind, %reason, "failed");
                    statuses.push(StatusUpdate {
                        id: tx.id,
                        status: TransactionStatus::Failed,
                        block_height: height,
                        gas_used: 0,
                        confirmed_at: None,
                    });
                }
                Err(ExecError::Store(source)) => {
                    return Err(EngineError::store(CyclePhase::Apply, source));
                }
            }
        }

        let summary = workspace.summary(height);
        let state_root = self
            .linker
            .state_root(&summary)
            .map_err(|source| EngineError::codec(CyclePhase::Link, source))?;
        let (accounts, contracts, balance_changes) = workspace.into_writes();
        let block = self
            .linker
            .seal(SealParams {
                previous: &tip,
                timestamp,
                tx_count: batch.len() as u32,
                gas_used: gas_total,
                state_root,
                included,
                producer: self.config.producer,
                produced_by: self.config.produced_by.clone(),
                signature: self.config.signature.clone(),
            })
            .map_err(|source| EngineError::codec(CyclePhase::Link, source))?;

        let commit = CycleCommit {
            block: block.clone(),
            accounts,
            contracts,
            balance_changes,
            statuses,
        };
        self.store
            .commit_cycle(commit)
            .await
            .map_err(|source| EngineError::store(CyclePhase::Commit, source))?;

        info!(
            height = block.height,
            hash = %block.hash,
            tx_count = block.tx_count,
            gas_used = block.gas_used,
            "block sealed"
        );
        Ok(CycleOutcome::Sealed(block))
    }
}
