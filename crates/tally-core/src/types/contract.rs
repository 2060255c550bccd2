//! Registered contracts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, ContractId, TransactionId};

/// A contract registered by a confirmed deployment transaction.
///
/// The engine stores contract source and metadata but never executes code;
/// calls against a contract only check that it exists and is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Unique contract identifier; the deployment transaction's `to` id.
    pub id: ContractId,
    /// Account that deployed the contract.
    pub owner: AccountId,
    /// Contract name from the deployment payload.
    pub name: String,
    /// Source text from the deployment payload.
    pub source_code: String,
    /// Client-supplied hash of the source, stored verbatim.
    pub code_hash: String,
    /// Optional description from the deployment payload.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional free-form metadata from the deployment payload.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Contract version label.
    pub version: String,
    /// Whether calls against the contract are accepted.
    pub is_active: bool,
    /// Height of the block whose cycle deployed the contract.
    pub deployed_in_block: u64,
    /// Transaction that deployed the contract.
    pub deployment_tx_id: TransactionId,
    /// When the contract record was created.
    pub created_at: DateTime<Utc>,
}

impl Contract {
    /// Version label assigned when the deployment payload names none.
    pub const DEFAULT_VERSION: &'static str = "1.0.0";
}
