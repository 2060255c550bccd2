//! Store error taxonomy

use thiserror::Error;

use tally_core::{AccountId, ContractId, CurrencyCode, Digest, TransactionId, TransactionStatus};

/// Failures raised by a state store.
///
/// `TipMismatch` is the concurrency signal: a cycle commit was built
/// against a chain tip that moved before the commit landed. Callers treat
/// it as retryable. Every other variant is either a constraint violation
/// in the commit itself or a backend fault.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The committed block does not extend the current chain tip.
    #[error("chain tip moved: block links {expected}, store tip is {found:?}")]
    TipMismatch {
        /// Hash the committed block expected the tip to have.
        expected: Digest,
        /// Hash of the actual tip, if any block exists.
        found: Option<Digest>,
    },

    /// A block already occupies the committed height.
    #[error("block height {height} already exists")]
    DuplicateBlock { height: u64 },

    /// An account with this id already exists.
    #[error("account {id} already exists")]
    DuplicateAccount { id: AccountId },

    /// Another account already holds this username.
    #[error("username {username} is already taken")]
    DuplicateUsername { username: String },

    /// A contract with this id already exists.
    #[error("contract {id} already exists")]
    DuplicateContract { id: ContractId },

    /// A transaction with this id is already queued or applied.
    #[error("transaction {id} already exists")]
    DuplicateTransaction { id: TransactionId },

    /// A status update referenced a transaction the store does not hold.
    #[error("transaction {id} not found")]
    UnknownTransaction { id: TransactionId },

    /// A status update tried to move a transaction out of a terminal state,
    /// or to a non-terminal one.
    #[error("transaction {id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// A balance delta would push the stored amount outside `Amount` range.
    #[error("balance of {owner} in {currency} would overflow")]
    BalanceOverflow {
        owner: AccountId,
        currency: CurrencyCode,
    },

    /// The backend itself failed.
    #[error("storage backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    /// Create a backend error with the given message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Whether the error signals a lost commit race rather than bad input.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::TipMismatch { .. } | Self::DuplicateBlock { .. }
        )
    }
}
