//! Tally Engine - turning queued transactions into blocks
//!
//! The engine drains pending transactions from a [`tally_store::StateStore`],
//! applies them strictly in order against an isolated cycle workspace, links
//! a new block to the current chain tip, and commits the whole cycle
//! atomically. One producer runs at a time; a tip that moves mid-cycle
//! surfaces as a retryable conflict instead of a fork.
//!
//! Entry points: [`TransactionPool::submit`] to queue work,
//! [`seed_genesis`] to bootstrap an empty chain, and
//! [`BlockProducer::produce_block`] to run one production cycle.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

/// Time source abstraction
pub mod clock;

/// Producer and genesis configuration
pub mod config;

/// Cycle-level errors
pub mod error;

/// Transaction decoding, validation, and application
pub mod executor;

/// Genesis block seeding
pub mod genesis;

/// Block sealing and state commitments
pub mod linker;

/// Transaction admission and batch reads
pub mod pool;

/// The production cycle
pub mod producer;

/// Overlay of uncommitted cycle writes
pub mod workspace;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use config::{GenesisConfig, ProducerConfig};
pub use error::EngineError;
pub use executor::{
    Applied, ContractSource, Effect, ExecError, StateChange, UserProfile, ValidationError,
};
pub use genesis::{seed_genesis, GenesisError};
pub use linker::{ChainLinker, SealParams, Sha256Commitment, StateCommitment};
pub use pool::{SubmitError, TransactionDraft, TransactionPool};
pub use producer::{BlockProducer, CycleOutcome, CyclePhase};
pub use workspace::{BalanceOverflow, CycleContext, CycleSummary, CycleWorkspace};

/// Gas charged to every confirmed transaction as a floor.
pub const BASE_GAS: u64 = 21_000;

/// Gas charged to a confirmed contract deployment.
pub const DEPLOYMENT_GAS: u64 = 3 * BASE_GAS;

/// Gas charged to a confirmed contract call.
pub const CALL_GAS: u64 = 5 * BASE_GAS;

/// Most transactions a single block may include.
pub const MAX_TX_PER_BLOCK: usize = 1_000;

/// Gas ceiling written into the genesis block and inherited by every
/// subsequent block.
pub const DEFAULT_GAS_LIMIT: u64 = 30_000_000;
