//! Producer and genesis configuration
//!
//! The producing identity is ordinary configuration, injected where the
//! producer is constructed. Nothing in the engine hardcodes a system
//! account.

use serde::{Deserialize, Serialize};

use tally_core::AccountId;

use crate::{DEFAULT_GAS_LIMIT, MAX_TX_PER_BLOCK};

/// Configuration for a [`crate::BlockProducer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Account identity recorded as the producer of sealed blocks.
    pub producer: AccountId,
    /// Free-form tag stored in block metadata naming the producing process.
    pub produced_by: String,
    /// Placeholder signature attached to sealed blocks; never verified.
    pub signature: String,
    /// Most transactions drained per cycle.
    pub batch_limit: usize,
}

impl ProducerConfig {
    /// Configuration with the given producing identity and default limits.
    pub fn new(producer: AccountId) -> Self {
        Self {
            producer,
            produced_by: "tally-engine".to_string(),
            signature: "unsigned".to_string(),
            batch_limit: MAX_TX_PER_BLOCK,
        }
    }

    /// Override the per-cycle batch limit.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Override the metadata tag naming the producing process.
    pub fn with_produced_by(mut self, tag: impl Into<String>) -> Self {
        self.produced_by = tag.into();
        self
    }
}

/// Configuration for [`crate::seed_genesis`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Account identity recorded as the genesis producer.
    pub producer: AccountId,
    /// Metadata tag for the genesis block.
    pub produced_by: String,
    /// Placeholder signature for the genesis block.
    pub signature: String,
    /// Gas ceiling for the genesis block, inherited by every later block.
    pub gas_limit: u64,
}

impl GenesisConfig {
    /// Configuration with the given producing identity and the default
    /// gas limit.
    pub fn new(producer: AccountId) -> Self {
        Self {
            producer,
            produced_by: "tally-engine".to_string(),
            signature: "unsigned".to_string(),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }

    /// Override the inherited gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }
}
