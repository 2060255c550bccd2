//! Block sealing and state commitments
//!
//! Sealing is pure: given the predecessor block, the batch outcome, and a
//! timestamp, the linker constructs the next block and computes its hash.
//! The state root comes from a [`StateCommitment`] so the commitment
//! scheme can change without touching the chain format; the default is
//! SHA-256 over the canonical encoding of the cycle summary.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tally_core::{AccountId, Block, BlockMetadata, CodecError, Digest, TransactionId};

use crate::workspace::CycleSummary;

/// Commitment over the state a cycle touched.
///
/// Implementations must be deterministic and order-independent: the same
/// summary always commits to the same digest, and the summary itself is
/// already normalized. Nothing may require enumerating historical state.
pub trait StateCommitment: Send + Sync {
    /// Commit to the given cycle summary.
    fn commit(&self, summary: &CycleSummary) -> Result<Digest, CodecError>;
}

/// Default commitment: SHA-256 over the canonical summary encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Commitment;

impl StateCommitment for Sha256Commitment {
    fn commit(&self, summary: &CycleSummary) -> Result<Digest, CodecError> {
        tally_core::canonical::digest_json(summary)
    }
}

/// Inputs for sealing one block.
#[derive(Debug)]
pub struct SealParams<'a> {
    /// Block being extended.
    pub previous: &'a Block,
    /// Cycle timestamp; becomes both `timestamp` and `finalized_at`.
    pub timestamp: DateTime<Utc>,
    /// Transactions in the batch, failed ones included.
    pub tx_count: u32,
    /// Gas consumed by confirmed transactions.
    pub gas_used: u64,
    /// State root committed for the cycle.
    pub state_root: Digest,
    /// Ids of every included transaction, batch order.
    pub included: Vec<TransactionId>,
    /// Producing identity.
    pub producer: AccountId,
    /// Metadata tag naming the producing process.
    pub produced_by: String,
    /// Placeholder block signature.
    pub signature: String,
}

/// Builds blocks that extend the chain tip.
pub struct ChainLinker {
    commitment: Arc<dyn StateCommitment>,
}

impl ChainLinker {
    /// Linker using the given commitment scheme.
    pub fn new(commitment: Arc<dyn StateCommitment>) -> Self {
        Self { commitment }
    }

    /// Compute the state root for a cycle summary.
    pub fn state_root(&self, summary: &CycleSummary) -> Result<Digest, CodecError> {
        self.commitment.commit(summary)
    }

    /// Construct the next block and compute its hash.
    ///
    /// Height increments by one, `previous_hash` links to the
    /// predecessor, and the gas limit carries over unchanged.
    pub fn seal(&self, params: SealParams<'_>) -> Result<Block, CodecError> {
        let mut block = Block {
            height: params.previous.height + 1,
            hash: Digest::ZERO,
            previous_hash: params.previous.hash,
            timestamp: params.timestamp,
            tx_count: params.tx_count,
            state_root: params.state_root,
            gas_used: params.gas_used,
            gas_limit: params.previous.gas_limit,
            producer: params.producer,
            signature: params.signature,
            metadata: BlockMetadata {
                transactions: params.included,
                produced_by: params.produced_by,
            },
            finalized_at: params.timestamp,
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }
}

impl Default for ChainLinker {
    fn default() -> Self {
        Self::new(Arc::new(Sha256Commitment))
    }
}
