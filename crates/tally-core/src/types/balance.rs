//! Per-account, per-currency balances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount, CurrencyCode};

/// Holdings of one account in one currency.
///
/// A balance record exists only once a transfer has touched the
/// (owner, currency) pair; until then the amount is implicitly zero. The
/// amount is signed and may legitimately be negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Account holding the balance.
    pub owner: AccountId,
    /// Currency dimension.
    pub currency: CurrencyCode,
    /// Current amount, in whole units.
    pub amount: Amount,
    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,
}
