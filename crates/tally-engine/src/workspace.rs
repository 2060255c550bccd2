//! Overlay of uncommitted cycle writes
//!
//! A production cycle must see its own earlier writes (an account created
//! by transaction three exists for transaction seven) without leaking
//! anything to other readers before the commit lands. The workspace layers
//! pending creations and balance deltas over the committed store: reads
//! check the overlay first and fall through to the store, writes touch
//! only the overlay. When the cycle seals, the overlay drains into the
//! atomic commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use tally_core::{Account, AccountId, Amount, Contract, ContractId, CurrencyCode};
use tally_store::{BalanceChange, StateStore, StoreError};

/// Fixed inputs shared by every transaction in one cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleContext {
    /// Height of the block being produced.
    pub height: u64,
    /// Timestamp of the cycle; becomes the block timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Order-independent summary of the state one cycle touched.
///
/// Created ids are sorted and balance deltas are netted per
/// (owner, currency) pair, so two cycles applying the same set of
/// transactions in any order summarize identically. The state root is a
/// digest of this summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    /// Height of the block the summary belongs to.
    pub height: u64,
    /// Ids of accounts created in the cycle, ascending.
    pub accounts: Vec<AccountId>,
    /// Ids of contracts created in the cycle, ascending.
    pub contracts: Vec<ContractId>,
    /// Net balance movement per touched (owner, currency) pair, in key
    /// order.
    pub balances: Vec<BalanceChange>,
}

impl CycleSummary {
    /// Summary of a cycle that touched nothing, as genesis commits to.
    pub fn empty(height: u64) -> Self {
        Self {
            height,
            accounts: Vec::new(),
            contracts: Vec::new(),
            balances: Vec::new(),
        }
    }
}

/// A recorded movement would push a balance outside `Amount` range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("balance of {owner} in {currency} would overflow")]
pub struct BalanceOverflow {
    /// Account whose balance would wrap.
    pub owner: AccountId,
    /// Currency dimension of the wrapping balance.
    pub currency: CurrencyCode,
}

/// Uncommitted writes of the cycle in progress, layered over the store.
pub struct CycleWorkspace {
    store: Arc<dyn StateStore>,
    accounts: BTreeMap<AccountId, Account>,
    usernames: BTreeSet<String>,
    contracts: BTreeMap<ContractId, Contract>,
    deltas: BTreeMap<(AccountId, CurrencyCode), Amount>,
}

impl CycleWorkspace {
    /// Start an empty workspace over the committed store.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            accounts: BTreeMap::new(),
            usernames: BTreeSet::new(),
            contracts: BTreeMap::new(),
            deltas: BTreeMap::new(),
        }
    }

    /// Whether an account with this id exists, in the overlay or the store.
    pub async fn account_exists(&self, id: AccountId) -> Result<bool, StoreError> {
        if self.accounts.contains_key(&id) {
            return Ok(true);
        }
        Ok(self.store.account(id).await?.is_some())
    }

    /// Whether a username is held by a committed account or claimed
    /// earlier in this cycle.
    pub async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        if self.usernames.contains(username) {
            return Ok(true);
        }
        Ok(self.store.account_by_username(username).await?.is_some())
    }

    /// Look up a contract, seeing deployments from earlier in the cycle.
    pub async fn contract(&self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        if let Some(contract) = self.contracts.get(&id) {
            return Ok(Some(contract.clone()));
        }
        self.store.contract(id).await
    }

    /// Record an account creation in the overlay.
    pub fn create_account(&mut self, account: Account) {
        self.usernames.insert(account.username.clone());
        self.accounts.insert(account.id, account);
    }

    /// Record a contract creation in the overlay.
    pub fn create_contract(&mut self, contract: Contract) {
        self.contracts.insert(contract.id, contract);
    }

    /// Accumulate a signed balance movement for one (owner, currency) pair.
    ///
    /// Fails if the pair's netted delta would leave `Amount` range; the
    /// overlay keeps its previous value in that case.
    pub fn adjust_balance(
        &mut self,
        owner: AccountId,
        currency: &CurrencyCode,
        delta: Amount,
    ) -> Result<(), BalanceOverflow> {
        let key = (owner, currency.clone());
        let current = self.deltas.get(&key).copied().unwrap_or(0);
        let next = current.checked_add(delta).ok_or_else(|| BalanceOverflow {
            owner,
            currency: currency.clone(),
        })?;
        self.deltas.insert(key, next);
        Ok(())
    }

    /// Whether one more movement on a pair stays within `Amount` range,
    /// both for the cycle's netted delta and for the committed balance it
    /// will land on.
    pub async fn adjustment_fits(
        &self,
        owner: AccountId,
        currency: &CurrencyCode,
        delta: Amount,
    ) -> Result<bool, StoreError> {
        let pending = self
            .deltas
            .get(&(owner, currency.clone()))
            .copied()
            .unwrap_or(0);
        let Some(netted) = pending.checked_add(delta) else {
            return Ok(false);
        };
        let committed = self
            .store
            .balance(owner, currency)
            .await?
            .map(|balance| balance.amount)
            .unwrap_or(0);
        Ok(committed.checked_add(netted).is_some())
    }

    /// Summarize the state this cycle touched, for the state commitment.
    pub fn summary(&self, height: u64) -> CycleSummary {
        CycleSummary {
            height,
            accounts: self.accounts.keys().copied().collect(),
            contracts: self.contracts.keys().copied().collect(),
            balances: self
                .deltas
                .iter()
                .map(|((owner, currency), delta)| BalanceChange {
                    owner: *owner,
                    currency: currency.clone(),
                    delta: *delta,
                })
                .collect(),
        }
    }

    /// Drain the overlay into the write lists a cycle commit carries.
    pub fn into_writes(self) -> (Vec<Account>, Vec<Contract>, Vec<BalanceChange>) {
        let accounts = self.accounts.into_values().collect();
        let contracts = self.contracts.into_values().collect();
        let balance_changes = self
            .deltas
            .into_iter()
            .map(|((owner, currency), delta)| BalanceChange {
                owner,
                currency,
                delta,
            })
            .collect();
        (accounts, contracts, balance_changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tally_core::{Balance, Digest};
    use tally_store::{MemoryStore, StateRead};

    fn account(username: &str) -> Account {
        Account {
            id: AccountId::new(),
            username: username.to_string(),
            display_name: username.trim_start_matches('@').to_string(),
            public_key: "pk".to_string(),
            bio: None,
            state_hash: Digest::ZERO,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn overlay_reads_see_uncommitted_writes() {
        let store = Arc::new(MemoryStore::new());
        let mut workspace = CycleWorkspace::new(store.clone());

        let created = account("@erin");
        let id = created.id;
        assert!(!workspace.account_exists(id).await.unwrap());

        workspace.create_account(created);
        assert!(workspace.account_exists(id).await.unwrap());
        assert!(workspace.username_taken("@erin").await.unwrap());

        // Nothing reached the store.
        assert!(store.account(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_fall_through_to_committed_state() {
        let store = Arc::new(MemoryStore::new());
        let committed = account("@frank");
        let id = committed.id;
        store.seed_account(committed).await.unwrap();

        let workspace = CycleWorkspace::new(store);
        assert!(workspace.account_exists(id).await.unwrap());
        assert!(workspace.username_taken("@frank").await.unwrap());
        assert!(!workspace.username_taken("@grace").await.unwrap());
    }

    #[tokio::test]
    async fn deltas_net_per_balance() {
        let store = Arc::new(MemoryStore::new());
        let mut workspace = CycleWorkspace::new(store);
        let owner = AccountId::new();
        let usd = CurrencyCode::new("USD");

        workspace.adjust_balance(owner, &usd, -50).unwrap();
        workspace.adjust_balance(owner, &usd, 20).unwrap();
        workspace
            .adjust_balance(owner, &CurrencyCode::new("EUR"), 7)
            .unwrap();

        let (_, _, changes) = workspace.into_writes();
        assert_eq!(changes.len(), 2);
        let usd_change = changes
            .iter()
            .find(|change| change.currency == usd)
            .unwrap();
        assert_eq!(usd_change.delta, -30);
    }

    #[tokio::test]
    async fn summary_is_order_independent() {
        let store = Arc::new(MemoryStore::new());
        let a = account("@erin");
        let b = account("@frank");
        let owner = AccountId::new();
        let usd = CurrencyCode::new("USD");

        let mut forward = CycleWorkspace::new(store.clone());
        forward.create_account(a.clone());
        forward.create_account(b.clone());
        forward.adjust_balance(owner, &usd, -10).unwrap();
        forward.adjust_balance(owner, &usd, 4).unwrap();

        let mut reverse = CycleWorkspace::new(store);
        reverse.adjust_balance(owner, &usd, 4).unwrap();
        reverse.adjust_balance(owner, &usd, -10).unwrap();
        reverse.create_account(b);
        reverse.create_account(a);

        assert_eq!(forward.summary(5), reverse.summary(5));
    }

    #[tokio::test]
    async fn adjustments_refuse_to_wrap() {
        let store = Arc::new(MemoryStore::new());
        let mut workspace = CycleWorkspace::new(store);
        let owner = AccountId::new();
        let usd = CurrencyCode::new("USD");

        workspace.adjust_balance(owner, &usd, Amount::MAX).unwrap();
        let err = workspace.adjust_balance(owner, &usd, 1).unwrap_err();
        assert_eq!(err.owner, owner);
        assert_eq!(err.currency, usd);

        // The failed movement left the netted delta alone.
        let (_, _, changes) = workspace.into_writes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].delta, Amount::MAX);
    }

    #[tokio::test]
    async fn fit_checks_cover_committed_and_pending_sides() {
        let store = Arc::new(MemoryStore::new());
        let owner = AccountId::new();
        let usd = CurrencyCode::new("USD");
        store
            .seed_balance(Balance {
                owner,
                currency: usd.clone(),
                amount: Amount::MAX,
                updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            })
            .await;

        let mut workspace = CycleWorkspace::new(store);
        assert!(workspace.adjustment_fits(owner, &usd, -1).await.unwrap());
        assert!(!workspace.adjustment_fits(owner, &usd, 1).await.unwrap());

        // A pending debit makes room over the committed amount again.
        workspace.adjust_balance(owner, &usd, -5).unwrap();
        assert!(workspace.adjustment_fits(owner, &usd, 5).await.unwrap());
        assert!(!workspace.adjustment_fits(owner, &usd, 6).await.unwrap());
    }
}
