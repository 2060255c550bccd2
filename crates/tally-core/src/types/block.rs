//! Hash-chained blocks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::error::CodecError;

use super::{AccountId, Digest, TransactionId};

/// Auxiliary block data outside the hashed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Ids of every transaction the block included, failed ones too.
    pub transactions: Vec<TransactionId>,
    /// Free-form tag naming the producing process.
    pub produced_by: String,
}

/// One block in the chain.
///
/// `hash` commits to exactly the fields enumerated by [`Block::compute_hash`];
/// everything else (metadata, signature, finalization time) rides alongside
/// without being bound by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain; genesis is 0.
    pub height: u64,
    /// Digest of this block's hashed fields.
    pub hash: Digest,
    /// Hash of the predecessor; all zeros for genesis.
    pub previous_hash: Digest,
    /// Producer-assigned timestamp for the cycle.
    pub timestamp: DateTime<Utc>,
    /// Number of transactions included, failed ones counted.
    pub tx_count: u32,
    /// Commitment over the state touched by the block's cycle.
    pub state_root: Digest,
    /// Gas consumed by confirmed transactions only.
    pub gas_used: u64,
    /// Gas ceiling, inherited from the predecessor block.
    pub gas_limit: u64,
    /// Account identity of the producer.
    pub producer: AccountId,
    /// Opaque signature placeholder; never verified.
    pub signature: String,
    /// Auxiliary data outside the hash.
    pub metadata: BlockMetadata,
    /// When the block was finalized.
    pub finalized_at: DateTime<Utc>,
}

/// The exact field set a block hash commits to.
#[derive(Serialize)]
struct HashedFields {
    height: u64,
    previous_hash: Digest,
    timestamp: DateTime<Utc>,
    tx_count: u32,
    state_root: Digest,
    gas_used: u64,
    producer: AccountId,
}

impl Block {
    /// Recompute the digest of the chain-critical fields.
    ///
    /// SHA-256 over the canonical encoding of height, previous hash,
    /// timestamp, transaction count, state root, gas used, and producer.
    /// The stored `hash` field is not an input, so a well-formed block
    /// satisfies `block.hash == block.compute_hash()?`.
    pub fn compute_hash(&self) -> Result<Digest, CodecError> {
        canonical::digest_json(&HashedFields {
            height: self.height,
            previous_hash: self.previous_hash,
            timestamp: self.timestamp,
            tx_count: self.tx_count,
            state_root: self.state_root,
            gas_used: self.gas_used,
            producer: self.producer,
        })
    }

    /// Whether this block directly extends `previous` in the chain.
    pub fn follows(&self, previous: &Block) -> bool {
        self.height == previous.height + 1 && self.previous_hash == previous.hash
    }

    /// Whether this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.previous_hash.is_zero()
    }
}
