//! Atomic cycle commits
//!
//! A production cycle buffers everything it wants to write and hands the
//! store one [`CycleCommit`]. The store validates the whole commit against
//! current state before mutating anything, so a rejected commit leaves no
//! trace. This replaces the piecemeal writes a cycle would otherwise make
//! (insert block, flip each status, adjust each balance) with a single
//! transactional boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{
    Account, AccountId, Amount, Block, Contract, CurrencyCode, TransactionId, TransactionStatus,
};

/// Net movement on one (owner, currency) balance.
///
/// Deltas are signed and already netted per pair: a cycle that debits and
/// credits the same balance repeatedly still contributes one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// Account whose balance moves.
    pub owner: AccountId,
    /// Currency dimension.
    pub currency: CurrencyCode,
    /// Signed amount added to the balance.
    pub delta: Amount,
}

/// Terminal status for one transaction in the committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Transaction being finalized.
    pub id: TransactionId,
    /// New terminal status, `Confirmed` or `Failed`.
    pub status: TransactionStatus,
    /// Height of the block that included the transaction.
    pub block_height: u64,
    /// Gas charged; zero for failed transactions.
    pub gas_used: u64,
    /// Confirmation time; `None` for failed transactions.
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Everything one production cycle writes, applied atomically.
///
/// The commit is accepted only while `block.previous_hash` still matches
/// the store's tip; a tip that moved since the cycle read it rejects the
/// whole commit with [`crate::StoreError::TipMismatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleCommit {
    /// The sealed block extending the tip the cycle read.
    pub block: Block,
    /// Accounts created by confirmed user-creation transactions.
    pub accounts: Vec<Account>,
    /// Contracts created by confirmed deployment transactions.
    pub contracts: Vec<Contract>,
    /// Net balance movements from confirmed transfers.
    pub balance_changes: Vec<BalanceChange>,
    /// Terminal status for every transaction in the batch.
    pub statuses: Vec<StatusUpdate>,
}

impl CycleCommit {
    /// Commit containing only the block, for cycles whose batch produced
    /// no state writes (every transaction failed).
    pub fn block_only(block: Block, statuses: Vec<StatusUpdate>) -> Self {
        Self {
            block,
            accounts: Vec::new(),
            contracts: Vec::new(),
            balance_changes: Vec::new(),
            statuses,
        }
    }
}
