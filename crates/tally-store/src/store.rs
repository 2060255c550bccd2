//! State store traits
//!
//! Split into a read side and a full store so components that only inspect
//! state (admission checks, demos, tests) can take the narrower bound.
//! Both traits are object safe; the engine holds `Arc<dyn StateStore>`.

use async_trait::async_trait;

use tally_core::{
    Account, AccountId, Balance, Block, Contract, ContractId, CurrencyCode, Transaction,
    TransactionId,
};

use crate::commit::CycleCommit;
use crate::error::StoreError;

/// Read-only view of committed ledger state.
///
/// Readers never observe a cycle in progress; every method reflects the
/// state as of the last successful commit.
#[async_trait]
pub trait StateRead: Send + Sync {
    /// The current chain tip, or `None` before genesis is seeded.
    async fn latest_block(&self) -> Result<Option<Block>, StoreError>;

    /// The block at an exact height, if one exists.
    async fn block_by_height(&self, height: u64) -> Result<Option<Block>, StoreError>;

    /// Up to `limit` pending transactions, oldest first.
    ///
    /// Ordering is by creation time ascending; ties fall back to queue
    /// insertion order, so repeated reads see a stable prefix.
    async fn pending_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StoreError>;

    /// Look up one transaction by id.
    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Look up an account by id.
    async fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Look up an account by exact username.
    async fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Whether any pending user-creation transaction already claims this
    /// username.
    async fn pending_username_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// Look up a contract by id.
    async fn contract(&self, id: ContractId) -> Result<Option<Contract>, StoreError>;

    /// The balance record for one (owner, currency) pair, if a transfer
    /// has ever touched it.
    async fn balance(
        &self,
        owner: AccountId,
        currency: &CurrencyCode,
    ) -> Result<Option<Balance>, StoreError>;
}

/// Full store: reads plus the three permitted mutations.
#[async_trait]
pub trait StateStore: StateRead {
    /// Queue a new transaction. Fails on id collision.
    async fn insert_transaction(&self, transaction: Transaction) -> Result<(), StoreError>;

    /// Insert a block directly, bypassing cycle validation. Only genesis
    /// seeding uses this; production cycles go through
    /// [`StateStore::commit_cycle`].
    async fn insert_block(&self, block: Block) -> Result<(), StoreError>;

    /// Apply one production cycle atomically.
    ///
    /// The entire commit is validated first (tip still current, no id or
    /// username collisions, every status transition legal) and applied
    /// only if every check passes. On any error the store is untouched.
    async fn commit_cycle(&self, commit: CycleCommit) -> Result<(), StoreError>;
}
