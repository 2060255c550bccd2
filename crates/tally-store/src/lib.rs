//! Tally Store - persistence boundary for ledger state
//!
//! The engine never touches storage directly; it speaks to the [`StateRead`]
//! and [`StateStore`] traits defined here. The write side is deliberately
//! narrow: apart from queueing transactions and seeding genesis, the only
//! mutation is [`StateStore::commit_cycle`], which lands an entire
//! production cycle (block, created entities, balance movements, status
//! flips) atomically or not at all.
//!
//! [`MemoryStore`] is the in-process backend. A persistent backend would
//! implement the same traits with the same commit semantics.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

pub mod commit;
pub mod error;
pub mod memory;
pub mod store;

pub use commit::{BalanceChange, CycleCommit, StatusUpdate};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{StateRead, StateStore};
