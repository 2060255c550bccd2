//! Chain bootstrap
//!
//! The first block is seeded outside the production cycle: height zero,
//! an all-zero predecessor hash, an empty batch, and the state root of an
//! empty cycle summary. Every later block inherits its gas limit.

use thiserror::Error;
use tracing::info;

use tally_core::{Block, BlockMetadata, CodecError, Digest};
use tally_store::{StateStore, StoreError};

use crate::clock::Clock;
use crate::config::GenesisConfig;
use crate::linker::{Sha256Commitment, StateCommitment};
use crate::workspace::CycleSummary;

/// Failures while seeding the first block.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// The store already holds a chain.
    #[error("chain is already seeded")]
    AlreadySeeded,
    /// The store failed while seeding.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Canonical encoding failed while hashing the block.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Seed an empty store with the genesis block.
///
/// Fails with [`GenesisError::AlreadySeeded`] if any block exists, so a
/// restarted process can call this unconditionally and ignore that case.
pub async fn seed_genesis(
    store: &dyn StateStore,
    config: &GenesisConfig,
    clock: &dyn Clock,
) -> Result<Block, GenesisError> {
    if store.latest_block().await?.is_some() {
        return Err(GenesisError::AlreadySeeded);
    }

    let timestamp = clock.now();
    let state_root = Sha256Commitment.commit(&CycleSummary::empty(0))?;
    let mut block = Block {
        height: 0,
        hash: Digest::ZERO,
        previous_hash: Digest::ZERO,
        timestamp,
        tx_count: 0,
        state_root,
        gas_used: 0,
        gas_limit: config.gas_limit,
        producer: config.producer,
        signature: config.signature.clone(),
        metadata: BlockMetadata {
            transactions: Vec::new(),
            produced_by: config.produced_by.clone(),
        },
        finalized_at: timestamp,
    };
    block.hash = block.compute_hash()?;

    store.insert_block(block.clone()).await?;
    info!(hash = %block.hash, gas_limit = block.gas_limit, "genesis block seeded");
    Ok(block)
}
