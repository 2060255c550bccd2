//! Tally Core - ledger domain vocabulary
//!
//! This crate defines the record types the rest of the workspace moves
//! around: accounts, balances, transactions, contracts, and blocks, plus the
//! identifier and digest newtypes they are keyed by. It also owns the
//! canonical encoding used for every hash in the system, so block hashes and
//! state roots are computed the same way everywhere.
//!
//! Nothing in this crate performs IO or holds state; execution rules live in
//! `tally-engine` and persistence behind the `tally-store` traits.

#![forbid(unsafe_code)]

/// Canonical JSON encoding and SHA-256 digests
pub mod canonical;

/// Encoding errors
pub mod error;

/// Domain record types and identifiers
pub mod types;

pub use error::CodecError;
pub use types::{
    Account, AccountId, Amount, Balance, Block, BlockMetadata, Contract, ContractId,
    CurrencyCode, Digest, Transaction, TransactionId, TransactionKind, TransactionStatus,
};
