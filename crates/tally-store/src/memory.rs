//! In-memory state store
//!
//! Backend used by tests, demos, and single-process deployments. All state
//! sits behind one `tokio::sync::RwLock`, which is what makes
//! `commit_cycle` trivially atomic: validation and application happen under
//! a single write guard, and validation never mutates.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use tally_core::{
    Account, AccountId, Amount, Balance, Block, Contract, ContractId, CurrencyCode, Transaction,
    TransactionId, TransactionKind, TransactionStatus,
};

use crate::commit::CycleCommit;
use crate::error::StoreError;
use crate::store::{StateRead, StateStore};

#[derive(Default)]
struct Inner {
    blocks: BTreeMap<u64, Block>,
    transactions: HashMap<TransactionId, Transaction>,
    // Queue insertion order; pending scans replay this to break timestamp ties.
    arrival: Vec<TransactionId>,
    accounts: HashMap<AccountId, Account>,
    usernames: HashMap<String, AccountId>,
    contracts: HashMap<ContractId, Contract>,
    balances: BTreeMap<(AccountId, CurrencyCode), Balance>,
}

/// In-memory [`StateStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store. No genesis block exists until one is seeded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account record directly, bypassing the transaction flow.
    ///
    /// Bootstrap and test support; production accounts are created by
    /// confirmed user-creation transactions inside a cycle commit.
    pub async fn seed_account(&self, account: Account) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.accounts.contains_key(&account.id) {
            return Err(StoreError::DuplicateAccount { id: account.id });
        }
        if inner.usernames.contains_key(&account.username) {
            return Err(StoreError::DuplicateUsername {
                username: account.username.clone(),
            });
        }
        inner.usernames.insert(account.username.clone(), account.id);
        inner.accounts.insert(account.id, account);
        Ok(())
    }

    /// Set a balance record directly, overwriting any existing record for
    /// the (owner, currency) pair. Bootstrap and test support.
    pub async fn seed_balance(&self, balance: Balance) {
        let mut inner = self.inner.write().await;
        inner
            .balances
            .insert((balance.owner, balance.currency.clone()), balance);
    }
}

#[async_trait]
impl StateRead for MemoryStore {
    async fn latest_block(&self) -> Result<Option<Block>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.blocks.values().next_back().cloned())
    }

    async fn block_by_height(&self, height: u64) -> Result<Option<Block>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.blocks.get(&height).cloned())
    }

    async fn pending_transactions(&self, limit: usize) -> Result<Vec<Transaction>, StoreError> {
        let inner = self.inner.read().await;
        let mut pending: Vec<Transaction> = inner
            .arrival
            .iter()
            .filter_map(|id| inner.transactions.get(id))
            .filter(|tx| tx.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        // Stable sort: equal timestamps keep arrival order.
        pending.sort_by_key(|tx| tx.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.transactions.get(&id).cloned())
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    async fn pending_username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        let claimed = inner.transactions.values().any(|tx| {
            tx.status == TransactionStatus::Pending
                && tx.kind == TransactionKind::UserCreation
                && tx
                    .payload
                    .as_ref()
                    .and_then(|payload| payload.get("username"))
                    .and_then(|value| value.as_str())
                    == Some(username)
        });
        Ok(claimed)
    }

    async fn contract(&self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.contracts.get(&id).cloned())
    }

    async fn balance(
        &self,
        owner: AccountId,
        currency: &CurrencyCode,
    ) -> Result<Option<Balance>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.balances.get(&(owner, currency.clone())).cloned())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn insert_transaction(&self, transaction: Transaction) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.transactions.contains_key(&transaction.id) {
            return Err(StoreError::DuplicateTransaction { id: transaction.id });
        }
        inner.arrival.push(transaction.id);
        inner.transactions.insert(transaction.id, transaction);
        Ok(())
    }

    async fn insert_block(&self, block: Block) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.blocks.contains_key(&block.height) {
            return Err(StoreError::DuplicateBlock {
                height: block.height,
            });
        }
        inner.blocks.insert(block.height, block);
        Ok(())
    }

    async fn commit_cycle(&self, commit: CycleCommit) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        // Validation phase. Nothing below may mutate; any error must leave
        // the store exactly as it was.
        match inner.blocks.values().next_back() {
            Some(tip) if commit.block.follows(tip) => {}
            tip => {
                return Err(StoreError::TipMismatch {
                    expected: commit.block.previous_hash,
                    found: tip.map(|block| block.hash),
                });
            }
        }

        let mut fresh_accounts = HashSet::new();
        let mut fresh_usernames = HashSet::new();
        for account in &commit.accounts {
            if inner.accounts.contains_key(&account.id) || !fresh_accounts.insert(account.id) {
                return Err(StoreError::DuplicateAccount { id: account.id });
            }
            if inner.usernames.contains_key(&account.username)
                || !fresh_usernames.insert(account.username.clone())
            {
                return Err(StoreError::DuplicateUsername {
                    username: account.username.clone(),
                });
            }
        }

        let mut fresh_contracts = HashSet::new();
        for contract in &commit.contracts {
            if inner.contracts.contains_key(&contract.id) || !fresh_contracts.insert(contract.id) {
                return Err(StoreError::DuplicateContract { id: contract.id });
            }
        }

        // Fold every delta onto the committed amounts with checked math, so
        // a movement that would wrap is rejected before anything lands.
        let mut projected: BTreeMap<(AccountId, CurrencyCode), Amount> = BTreeMap::new();
        for change in &commit.balance_changes {
            let key = (change.owner, change.currency.clone());
            let current = match projected.get(&key) {
                Some(amount) => *amount,
                None => inner
                    .balances
                    .get(&key)
                    .map(|balance| balance.amount)
                    .unwrap_or(0),
            };
            let next =
                current
                    .checked_add(change.delta)
                    .ok_or_else(|| StoreError::BalanceOverflow {
                        owner: change.owner,
                        currency: change.currency.clone(),
                    })?;
            projected.insert(key, next);
        }

        // Transactions already sitting at the same terminal status are
        // idempotent no-ops; everything else must be pending -> terminal.
        let mut already_terminal = HashSet::new();
        for update in &commit.statuses {
            let current = inner
                .transactions
                .get(&update.id)
                .ok_or(StoreError::UnknownTransaction { id: update.id })?;
            if !update.status.is_terminal() {
                return Err(StoreError::InvalidStatusTransition {
                    id: update.id,
                    from: current.status,
                    to: update.status,
                });
            }
            if current.status.is_terminal() {
                if current.status == update.status {
                    already_terminal.insert(update.id);
                } else {
                    return Err(StoreError::InvalidStatusTransition {
                        id: update.id,
                        from: current.status,
                        to: update.status,
                    });
                }
            }
        }

        // Application phase.
        let touched_at = commit.block.timestamp;

        for account in commit.accounts {
            inner.usernames.insert(account.username.clone(), account.id);
            inner.accounts.insert(account.id, account);
        }
        for contract in commit.contracts {
            inner.contracts.insert(contract.id, contract);
        }
        for ((owner, currency), amount) in projected {
            inner.balances.insert(
                (owner, currency.clone()),
                Balance {
                    owner,
                    currency,
                    amount,
                    updated_at: touched_at,
                },
            );
        }
        for update in commit.statuses {
            if already_terminal.contains(&update.id) {
                continue;
            }
            if let Some(tx) = inner.transactions.get_mut(&update.id) {
                tx.status = update.status;
                tx.gas_used = update.gas_used;
                tx.block_height = Some(update.block_height);
                tx.confirmed_at = update.confirmed_at;
            }
        }

        debug!(
            height = commit.block.height,
            hash = %commit.block.hash,
            "cycle committed"
        );
        inner.blocks.insert(commit.block.height, commit.block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{BalanceChange, StatusUpdate};
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};
    use tally_core::{BlockMetadata, Digest};

    fn base_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn genesis_block() -> Block {
        let mut block = Block {
            height: 0,
            hash: Digest::ZERO,
            previous_hash: Digest::ZERO,
            timestamp: base_time(),
            tx_count: 0,
            state_root: Digest::ZERO,
            gas_used: 0,
            gas_limit: 30_000_000,
            producer: AccountId::new(),
            signature: "unsigned".to_string(),
            metadata: BlockMetadata {
                transactions: Vec::new(),
                produced_by: "test".to_string(),
            },
            finalized_at: base_time(),
        };
        block.hash = block.compute_hash().unwrap();
        block
    }

    fn block_after(previous: &Block) -> Block {
        let mut block = Block {
            height: previous.height + 1,
            hash: Digest::ZERO,
            previous_hash: previous.hash,
            timestamp: previous.timestamp + Duration::seconds(10),
            tx_count: 0,
            state_root: Digest::from_bytes([3u8; 32]),
            gas_used: 0,
            gas_limit: previous.gas_limit,
            producer: previous.producer,
            signature: "unsigned".to_string(),
            metadata: BlockMetadata {
                transactions: Vec::new(),
                produced_by: "test".to_string(),
            },
            finalized_at: previous.timestamp + Duration::seconds(10),
        };
        block.hash = block.compute_hash().unwrap();
        block
    }

    fn pending_transfer(created_at: chrono::DateTime<Utc>) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            kind: TransactionKind::Transfer,
            from: AccountId::new(),
            to: AccountId::new(),
            amount: Some(25),
            currency: Some(CurrencyCode::new("USD")),
            contract_id: None,
            payload: None,
            signature: "sig".to_string(),
            status: TransactionStatus::Pending,
            gas_used: 0,
            block_height: None,
            created_at,
            confirmed_at: None,
        }
    }

    #[tokio::test]
    async fn latest_block_tracks_highest_height() {
        let store = MemoryStore::new();
        assert!(store.latest_block().await.unwrap().is_none());

        let genesis = genesis_block();
        let next = block_after(&genesis);
        store.insert_block(genesis.clone()).await.unwrap();
        store.insert_block(next.clone()).await.unwrap();

        let tip = store.latest_block().await.unwrap().unwrap();
        assert_eq!(tip.height, 1);
        assert_eq!(store.block_by_height(0).await.unwrap().unwrap(), genesis);
        assert_matches!(
            store.insert_block(next).await,
            Err(StoreError::DuplicateBlock { height: 1 })
        );
    }

    #[tokio::test]
    async fn pending_transactions_order_oldest_first() {
        let store = MemoryStore::new();
        let late = pending_transfer(base_time() + Duration::seconds(30));
        let early = pending_transfer(base_time());
        let middle = pending_transfer(base_time() + Duration::seconds(15));
        store.insert_transaction(late.clone()).await.unwrap();
        store.insert_transaction(early.clone()).await.unwrap();
        store.insert_transaction(middle.clone()).await.unwrap();

        let batch = store.pending_transactions(10).await.unwrap();
        let ids: Vec<_> = batch.iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec![early.id, middle.id, late.id]);

        let capped = store.pending_transactions(2).await.unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].id, early.id);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_arrival_order() {
        let store = MemoryStore::new();
        let first = pending_transfer(base_time());
        let second = pending_transfer(base_time());
        store.insert_transaction(first.clone()).await.unwrap();
        store.insert_transaction(second.clone()).await.unwrap();

        let batch = store.pending_transactions(10).await.unwrap();
        assert_eq!(batch[0].id, first.id);
        assert_eq!(batch[1].id, second.id);
    }

    #[tokio::test]
    async fn pending_username_scan_reads_payloads() {
        let store = MemoryStore::new();
        let mut tx = pending_transfer(base_time());
        tx.kind = TransactionKind::UserCreation;
        tx.payload = Some(serde_json::json!({ "username": "@carol" }));
        store.insert_transaction(tx).await.unwrap();

        assert!(store.pending_username_exists("@carol").await.unwrap());
        assert!(!store.pending_username_exists("@dave").await.unwrap());
    }

    #[tokio::test]
    async fn commit_cycle_applies_everything() {
        let store = MemoryStore::new();
        let genesis = genesis_block();
        store.insert_block(genesis.clone()).await.unwrap();

        let tx = pending_transfer(base_time());
        store.insert_transaction(tx.clone()).await.unwrap();

        let account = Account {
            id: AccountId::new(),
            username: "@carol".to_string(),
            display_name: "Carol".to_string(),
            public_key: "pk".to_string(),
            bio: None,
            state_hash: Digest::ZERO,
            created_at: base_time(),
        };
        let block = block_after(&genesis);
        let commit = CycleCommit {
            block: block.clone(),
            accounts: vec![account.clone()],
            contracts: Vec::new(),
            balance_changes: vec![
                BalanceChange {
                    owner: tx.from,
                    currency: CurrencyCode::new("USD"),
                    delta: -25,
                },
                BalanceChange {
                    owner: tx.to,
                    currency: CurrencyCode::new("USD"),
                    delta: 25,
                },
            ],
            statuses: vec![StatusUpdate {
                id: tx.id,
                status: TransactionStatus::Confirmed,
                block_height: block.height,
                gas_used: 21_000,
                confirmed_at: Some(block.timestamp),
            }],
        };
        store.commit_cycle(commit).await.unwrap();

        let tip = store.latest_block().await.unwrap().unwrap();
        assert_eq!(tip.height, 1);
        assert_eq!(
            store
                .account_by_username("@carol")
                .await
                .unwrap()
                .unwrap()
                .id,
            account.id
        );
        let sender = store
            .balance(tx.from, &CurrencyCode::new("USD"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sender.amount, -25);
        let confirmed = store.transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(confirmed.status, TransactionStatus::Confirmed);
        assert_eq!(confirmed.block_height, Some(1));
        assert_eq!(confirmed.gas_used, 21_000);
        assert!(confirmed.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn stale_tip_rejects_whole_commit() {
        let store = MemoryStore::new();
        let genesis = genesis_block();
        store.insert_block(genesis.clone()).await.unwrap();

        // Another producer lands a block first.
        let winner = block_after(&genesis);
        store.insert_block(winner.clone()).await.unwrap();

        let tx = pending_transfer(base_time());
        store.insert_transaction(tx.clone()).await.unwrap();

        // A commit still linked to genesis must be rejected wholesale.
        let stale = block_after(&genesis);
        let commit = CycleCommit {
            block: stale,
            accounts: Vec::new(),
            contracts: Vec::new(),
            balance_changes: vec![BalanceChange {
                owner: tx.from,
                currency: CurrencyCode::new("USD"),
                delta: -25,
            }],
            statuses: vec![StatusUpdate {
                id: tx.id,
                status: TransactionStatus::Confirmed,
                block_height: 1,
                gas_used: 21_000,
                confirmed_at: Some(base_time()),
            }],
        };
        let err = store.commit_cycle(commit).await.unwrap_err();
        assert_matches!(err, StoreError::TipMismatch { .. });
        assert!(err.is_conflict());

        // Nothing leaked.
        assert_eq!(store.latest_block().await.unwrap().unwrap().hash, winner.hash);
        assert!(store
            .balance(tx.from, &CurrencyCode::new("USD"))
            .await
            .unwrap()
            .is_none());
        let untouched = store.transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, TransactionStatus::Pending);
        assert_eq!(untouched.block_height, None);
    }

    #[tokio::test]
    async fn duplicate_username_rolls_back_commit() {
        let store = MemoryStore::new();
        let genesis = genesis_block();
        store.insert_block(genesis.clone()).await.unwrap();

        let taken = Account {
            id: AccountId::new(),
            username: "@carol".to_string(),
            display_name: "Carol".to_string(),
            public_key: "pk".to_string(),
            bio: None,
            state_hash: Digest::ZERO,
            created_at: base_time(),
        };
        store.seed_account(taken).await.unwrap();

        let tx = pending_transfer(base_time());
        store.insert_transaction(tx.clone()).await.unwrap();

        let clash = Account {
            id: AccountId::new(),
            username: "@carol".to_string(),
            display_name: "Carol Again".to_string(),
            public_key: "pk2".to_string(),
            bio: None,
            state_hash: Digest::ZERO,
            created_at: base_time(),
        };
        let block = block_after(&genesis);
        let commit = CycleCommit {
            block: block.clone(),
            accounts: vec![clash],
            contracts: Vec::new(),
            balance_changes: Vec::new(),
            statuses: vec![StatusUpdate {
                id: tx.id,
                status: TransactionStatus::Failed,
                block_height: block.height,
                gas_used: 0,
                confirmed_at: None,
            }],
        };
        assert_matches!(
            store.commit_cycle(commit).await,
            Err(StoreError::DuplicateUsername { .. })
        );
        // The status flip from the same commit must not have landed.
        let untouched = store.transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, TransactionStatus::Pending);
        assert_eq!(store.latest_block().await.unwrap().unwrap().height, 0);
    }

    #[tokio::test]
    async fn overflowing_balance_change_rejects_whole_commit() {
        let store = MemoryStore::new();
        let genesis = genesis_block();
        store.insert_block(genesis.clone()).await.unwrap();

        let rich = AccountId::new();
        store
            .seed_balance(Balance {
                owner: rich,
                currency: CurrencyCode::new("USD"),
                amount: i64::MAX,
                updated_at: base_time(),
            })
            .await;

        let tx = pending_transfer(base_time());
        store.insert_transaction(tx.clone()).await.unwrap();

        let account = Account {
            id: AccountId::new(),
            username: "@mallory".to_string(),
            display_name: "Mallory".to_string(),
            public_key: "pk".to_string(),
            bio: None,
            state_hash: Digest::ZERO,
            created_at: base_time(),
        };
        let block = block_after(&genesis);
        let commit = CycleCommit {
            block: block.clone(),
            accounts: vec![account.clone()],
            contracts: Vec::new(),
            balance_changes: vec![BalanceChange {
                owner: rich,
                currency: CurrencyCode::new("USD"),
                delta: 1,
            }],
            statuses: vec![StatusUpdate {
                id: tx.id,
                status: TransactionStatus::Confirmed,
                block_height: block.height,
                gas_used: 21_000,
                confirmed_at: Some(block.timestamp),
            }],
        };
        assert_matches!(
            store.commit_cycle(commit).await,
            Err(StoreError::BalanceOverflow { .. })
        );

        // Every piece of the commit was held back, account included.
        assert!(store.account(account.id).await.unwrap().is_none());
        assert_eq!(store.latest_block().await.unwrap().unwrap().height, 0);
        let untouched = store.transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, TransactionStatus::Pending);
        let balance = store
            .balance(rich, &CurrencyCode::new("USD"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.amount, i64::MAX);
    }

    #[tokio::test]
    async fn repeated_deltas_for_one_pair_are_folded_before_checking() {
        let store = MemoryStore::new();
        let genesis = genesis_block();
        store.insert_block(genesis.clone()).await.unwrap();

        let owner = AccountId::new();
        let change = BalanceChange {
            owner,
            currency: CurrencyCode::new("USD"),
            delta: i64::MAX,
        };
        // Each delta fits the empty balance on its own; together they wrap.
        let commit = CycleCommit {
            block: block_after(&genesis),
            accounts: Vec::new(),
            contracts: Vec::new(),
            balance_changes: vec![change.clone(), change],
            statuses: Vec::new(),
        };
        assert_matches!(
            store.commit_cycle(commit).await,
            Err(StoreError::BalanceOverflow { .. })
        );
        assert!(store
            .balance(owner, &CurrencyCode::new("USD"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn terminal_statuses_are_idempotent_but_never_flip() {
        let store = MemoryStore::new();
        let genesis = genesis_block();
        store.insert_block(genesis.clone()).await.unwrap();

        let tx = pending_transfer(base_time());
        store.insert_transaction(tx.clone()).await.unwrap();

        let first = block_after(&genesis);
        let confirm = StatusUpdate {
            id: tx.id,
            status: TransactionStatus::Confirmed,
            block_height: first.height,
            gas_used: 21_000,
            confirmed_at: Some(first.timestamp),
        };
        store
            .commit_cycle(CycleCommit::block_only(first.clone(), vec![confirm.clone()]))
            .await
            .unwrap();

        // Same terminal status again: accepted, nothing changes.
        let second = block_after(&first);
        let repeat = StatusUpdate {
            block_height: second.height,
            ..confirm
        };
        store
            .commit_cycle(CycleCommit::block_only(second.clone(), vec![repeat]))
            .await
            .unwrap();
        let stored = store.transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Confirmed);
        assert_eq!(stored.block_height, Some(first.height));

        // Different terminal status: rejected.
        let third = block_after(&second);
        let flip = StatusUpdate {
            id: tx.id,
            status: TransactionStatus::Failed,
            block_height: third.height,
            gas_used: 0,
            confirmed_at: None,
        };
        assert_matches!(
            store
                .commit_cycle(CycleCommit::block_only(third, vec![flip]))
                .await,
            Err(StoreError::InvalidStatusTransition { .. })
        );
    }

    #[tokio::test]
    async fn unknown_transaction_in_commit_is_rejected() {
        let store = MemoryStore::new();
        let genesis = genesis_block();
        store.insert_block(genesis.clone()).await.unwrap();

        let ghost = StatusUpdate {
            id: TransactionId::new(),
            status: TransactionStatus::Failed,
            block_height: 1,
            gas_used: 0,
            confirmed_at: None,
        };
        assert_matches!(
            store
                .commit_cycle(CycleCommit::block_only(block_after(&genesis), vec![ghost]))
                .await,
            Err(StoreError::UnknownTransaction { .. })
        );
    }
}
