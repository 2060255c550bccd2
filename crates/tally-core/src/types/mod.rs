//! Domain record types and identifiers
//!
//! The record shapes here mirror what the store persists. They carry no
//! behavior beyond construction helpers and the hash rules that define block
//! identity; validation and state transitions belong to `tally-engine`.

mod account;
mod balance;
mod block;
mod contract;
mod currency;
mod digest;
mod id;
mod transaction;

pub use account::Account;
pub use balance::Balance;
pub use block::{Block, BlockMetadata};
pub use contract::Contract;
pub use currency::{Amount, CurrencyCode};
pub use digest::Digest;
pub use id::{AccountId, ContractId, TransactionId};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
