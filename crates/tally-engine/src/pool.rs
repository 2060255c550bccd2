//! Transaction admission and batch reads
//!
//! The pool is the front door for new transactions. Admission performs the
//! structural checks that can be done cheaply at submit time, including the
//! username race check against both committed accounts and transactions
//! still waiting in the queue. It is a convenience gate, not a guarantee:
//! rows can reach the store without passing through here, so the executor
//! re-validates everything during the cycle.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use tally_core::{
    canonical, Account, AccountId, Amount, CodecError, ContractId, CurrencyCode, Transaction,
    TransactionId, TransactionKind, TransactionStatus,
};
use tally_store::{StateStore, StoreError};

use crate::clock::Clock;
use crate::executor::{ContractSource, UserProfile};

/// Rejections at the admission gate.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The engine does not execute this kind, so queueing it would only
    /// produce a failed transaction.
    #[error("unsupported transaction kind: {kind}")]
    UnsupportedKind {
        /// Wire label of the rejected kind.
        kind: String,
    },
    /// A structurally invalid draft.
    #[error("invalid {kind} draft: {reason}")]
    Invalid {
        /// Kind of the rejected draft.
        kind: TransactionKind,
        /// What was wrong with it.
        reason: String,
    },
    /// The username belongs to an existing account.
    #[error("username {username} is already taken")]
    UsernameTaken {
        /// Contested username.
        username: String,
    },
    /// The username is claimed by a transaction still in the queue.
    #[error("username {username} is already pending registration")]
    UsernameClaimed {
        /// Contested username.
        username: String,
    },
    /// The store failed while admitting.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Payload encoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A transaction before admission: everything the caller decides, nothing
/// the engine assigns.
///
/// Ids, timestamps, and status are attached by the pool when the draft is
/// accepted. The constructors sign the draft with a digest of its
/// canonical content; callers with real key material can override that
/// with [`TransactionDraft::with_signature`].
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    /// What the transaction does.
    pub kind: TransactionKind,
    /// Originating account.
    pub from: AccountId,
    /// Target account, or the id the created entity will occupy.
    pub to: AccountId,
    /// Transfer amount.
    pub amount: Option<Amount>,
    /// Transfer currency.
    pub currency: Option<CurrencyCode>,
    /// Contract invoked by a call.
    pub contract_id: Option<ContractId>,
    /// Kind-specific payload.
    pub payload: Option<serde_json::Value>,
    /// Opaque signature material.
    pub signature: String,
}

impl TransactionDraft {
    /// Draft moving `amount` of `currency` from one account to another.
    pub fn transfer(
        from: AccountId,
        to: AccountId,
        amount: Amount,
        currency: CurrencyCode,
    ) -> Result<Self, CodecError> {
        let signature = sign_fields(&(&from, &to, &amount, &currency))?;
        Ok(Self {
            kind: TransactionKind::Transfer,
            from,
            to,
            amount: Some(amount),
            currency: Some(currency),
            contract_id: None,
            payload: None,
            signature,
        })
    }

    /// Draft creating the account `to` will identify, from a profile.
    pub fn user_creation(
        from: AccountId,
        to: AccountId,
        profile: &UserProfile,
    ) -> Result<Self, CodecError> {
        let payload = serde_json::to_value(profile).map_err(CodecError::from)?;
        let signature = sign_fields(&payload)?;
        Ok(Self {
            kind: TransactionKind::UserCreation,
            from,
            to,
            amount: None,
            currency: None,
            contract_id: None,
            payload: Some(payload),
            signature,
        })
    }

    /// Draft registering the contract `to` will identify, from source.
    pub fn contract_deployment(
        from: AccountId,
        to: AccountId,
        source: &ContractSource,
    ) -> Result<Self, CodecError> {
        let payload = serde_json::to_value(source).map_err(CodecError::from)?;
        let signature = sign_fields(&payload)?;
        Ok(Self {
            kind: TransactionKind::ContractDeployment,
            from,
            to,
            amount: None,
            currency: None,
            contract_id: None,
            payload: Some(payload),
            signature,
        })
    }

    /// Draft calling an existing contract.
    pub fn contract_call(
        from: AccountId,
        to: AccountId,
        contract_id: ContractId,
    ) -> Result<Self, CodecError> {
        let signature = sign_fields(&(&from, &to, &contract_id))?;
        Ok(Self {
            kind: TransactionKind::ContractCall,
            from,
            to,
            amount: None,
            currency: None,
            contract_id: Some(contract_id),
            payload: None,
            signature,
        })
    }

    /// Replace the auto-generated signature.
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }
}

fn sign_fields<T: serde::Serialize>(fields: &T) -> Result<String, CodecError> {
    Ok(canonical::digest_json(fields)?.to_hex())
}

/// Admission gate and batch reader over the pending queue.
pub struct TransactionPool {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl TransactionPool {
    /// Pool over the given store and clock.
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Admit a draft into the queue, returning its assigned id.
    pub async fn submit(&self, draft: TransactionDraft) -> Result<TransactionId, SubmitError> {
        self.check(&draft).await?;

        let id = TransactionId::new();
        let transaction = Transaction {
            id,
            kind: draft.kind,
            from: draft.from,
            to: draft.to,
            amount: draft.amount,
            currency: draft.currency,
            contract_id: draft.contract_id,
            payload: draft.payload,
            signature: draft.signature,
            status: TransactionStatus::Pending,
            gas_used: 0,
            block_height: None,
            created_at: self.clock.now(),
            confirmed_at: None,
        };
        let kind = transaction.kind.clone();
        self.store.insert_transaction(transaction).await?;
        debug!(%id, %kind, "transaction queued");
        Ok(id)
    }

    /// Up to `limit` pending transactions, oldest first.
    pub async fn pending_batch(&self, limit: usize) -> Result<Vec<Transaction>, StoreError> {
        self.store.pending_transactions(limit).await
    }

    async fn check(&self, draft: &TransactionDraft) -> Result<(), SubmitError> {
        match &draft.kind {
            TransactionKind::Transfer => {
                if !draft.amount.is_some_and(|amount| amount > 0) {
                    return Err(invalid(&draft.kind, "amount must be positive"));
                }
                if !draft
                    .currency
                    .as_ref()
                    .is_some_and(|currency| !currency.is_empty())
                {
                    return Err(invalid(&draft.kind, "currency must be present"));
                }
                Ok(())
            }
            TransactionKind::UserCreation => {
                let payload = draft
                    .payload
                    .as_ref()
                    .ok_or_else(|| invalid(&draft.kind, "payload is missing"))?;
                let profile: UserProfile = serde_json::from_value(payload.clone())
                    .map_err(|err| invalid(&draft.kind, err.to_string()))?;
                if profile.username.is_empty()
                    || profile.display_name.is_empty()
                    || profile.public_key.is_empty()
                {
                    return Err(invalid(&draft.kind, "profile fields must be non-empty"));
                }
                if !profile.username.starts_with(Account::USERNAME_MARKER) {
                    return Err(invalid(&draft.kind, "username must start with '@'"));
                }
                if self
                    .store
                    .account_by_username(&profile.username)
                    .await?
                    .is_some()
                {
                    return Err(SubmitError::UsernameTaken {
                        username: profile.username,
                    });
                }
                if self.store.pending_username_exists(&profile.username).await? {
                    return Err(SubmitError::UsernameClaimed {
                        username: profile.username,
                    });
                }
                Ok(())
            }
            TransactionKind::ContractDeployment => {
                let payload = draft
                    .payload
                    .as_ref()
                    .ok_or_else(|| invalid(&draft.kind, "payload is missing"))?;
                let source: ContractSource = serde_json::from_value(payload.clone())
                    .map_err(|err| invalid(&draft.kind, err.to_string()))?;
                if source.name.is_empty()
                    || source.source_code.is_empty()
                    || source.code_hash.is_empty()
                {
                    return Err(invalid(&draft.kind, "source fields must be non-empty"));
                }
                Ok(())
            }
            TransactionKind::ContractCall => {
                if draft.contract_id.is_none() {
                    return Err(invalid(&draft.kind, "contract id must be present"));
                }
                Ok(())
            }
            TransactionKind::Other(label) => Err(SubmitError::UnsupportedKind {
                kind: label.clone(),
            }),
        }
    }
}

fn invalid(kind: &TransactionKind, reason: impl Into<String>) -> SubmitError {
    SubmitError::Invalid {
        kind: kind.clone(),
        reason: reason.into(),
    }
}
