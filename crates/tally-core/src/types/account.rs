//! Ledger accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Digest};

/// A ledger account created by a confirmed user-creation transaction.
///
/// The account id is pre-generated when the transaction is queued (it is
/// the transaction's `to` field), so the record exists only once the
/// transaction confirms. `state_hash` binds the account to the exact
/// creation payload it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub id: AccountId,
    /// Unique handle; always starts with [`Account::USERNAME_MARKER`].
    pub username: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Opaque public key material supplied at creation.
    pub public_key: String,
    /// Optional free-form profile text.
    pub bio: Option<String>,
    /// Digest of the canonical creation payload.
    pub state_hash: Digest,
    /// When the account record was created.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Marker character every username must start with.
    pub const USERNAME_MARKER: char = '@';
}
