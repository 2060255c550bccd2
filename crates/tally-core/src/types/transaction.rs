//! Queued and applied transactions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{AccountId, Amount, ContractId, CurrencyCode, TransactionId};

/// The closed set of transaction kinds the engine executes.
///
/// Kinds serialize as snake_case strings. Anything outside the known set
/// deserializes into [`TransactionKind::Other`] so records written by other
/// producers still load; the engine fails such transactions at execution
/// instead of refusing to read them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Move an amount of one currency between two accounts.
    Transfer,
    /// Create an account from the transaction payload.
    UserCreation,
    /// Register a contract from the transaction payload.
    ContractDeployment,
    /// Invoke an existing active contract (validation and gas only).
    ContractCall,
    /// A kind this engine does not execute.
    Other(String),
}

impl TransactionKind {
    /// The snake_case wire label of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Transfer => "transfer",
            Self::UserCreation => "user_creation",
            Self::ContractDeployment => "contract_deployment",
            Self::ContractCall => "contract_call",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TransactionKind {
    fn from(label: &str) -> Self {
        match label {
            "transfer" => Self::Transfer,
            "user_creation" => Self::UserCreation,
            "contract_deployment" => Self::ContractDeployment,
            "contract_call" => Self::ContractCall,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for TransactionKind {
    fn from(label: String) -> Self {
        Self::from(label.as_str())
    }
}

impl Serialize for TransactionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransactionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from(label))
    }
}

/// Lifecycle state of a transaction.
///
/// `Pending` is the only non-terminal state. Once a transaction is
/// `Confirmed` or `Failed` it never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Queued, not yet included in a block.
    Pending,
    /// Applied successfully and included in a block.
    Confirmed,
    /// Rejected during execution; included in a block without effect.
    Failed,
}

impl TransactionStatus {
    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A single ledger transaction.
///
/// One record shape serves every kind; which optional fields must be
/// present depends on the kind and is enforced at execution. For creation
/// kinds, `to` carries the id the new entity will occupy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier.
    pub id: TransactionId,
    /// What the transaction does.
    pub kind: TransactionKind,
    /// Originating account.
    pub from: AccountId,
    /// Target account, or the id a created entity will occupy.
    pub to: AccountId,
    /// Transfer amount, in whole units.
    pub amount: Option<Amount>,
    /// Transfer currency.
    pub currency: Option<CurrencyCode>,
    /// Contract invoked by a call.
    pub contract_id: Option<ContractId>,
    /// Kind-specific input, e.g. the creation payload.
    pub payload: Option<serde_json::Value>,
    /// Opaque signature material; never verified by the engine.
    pub signature: String,
    /// Lifecycle state.
    pub status: TransactionStatus,
    /// Gas charged when the transaction confirmed; zero otherwise.
    pub gas_used: u64,
    /// Height of the block that included the transaction, once terminal.
    pub block_height: Option<u64>,
    /// When the transaction was queued.
    pub created_at: DateTime<Utc>,
    /// When the transaction confirmed, if it did.
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_round_trip() {
        for kind in [
            TransactionKind::Transfer,
            TransactionKind::UserCreation,
            TransactionKind::ContractDeployment,
            TransactionKind::ContractCall,
            TransactionKind::Other("withdrawal".to_string()),
        ] {
            let label = kind.as_str().to_string();
            assert_eq!(TransactionKind::from(label), kind);
        }
    }

    #[test]
    fn unknown_kind_deserializes_as_other() {
        let kind: TransactionKind = serde_json::from_str("\"deposit\"").unwrap();
        assert_eq!(kind, TransactionKind::Other("deposit".to_string()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"deposit\"");
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Confirmed).unwrap(),
            "\"confirmed\""
        );
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
    }
}
