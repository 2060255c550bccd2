//! Transaction decoding, validation, and application
//!
//! Every transaction passes three steps: `decode` turns the stored record
//! into a typed [`Effect`] or rejects it, `validate` checks the effect
//! against current state (committed plus earlier writes from the same
//! cycle), and `apply` records the effect's writes in the cycle workspace.
//! A [`ValidationError`] at any step fails that one transaction; the cycle
//! itself continues with the next.
//!
//! Transfers deliberately skip a sender-sufficiency check. The ledger
//! records overdrafts as negative balances instead of rejecting them, and
//! debiting a balance nobody has touched yet creates the record at the
//! negative amount so a confirmed transfer always moves exactly its amount.
//! The one balance rule transfers do enforce is range: a movement that
//! would push either side outside `Amount` fails the transaction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tally_core::{
    canonical, Account, AccountId, Amount, Contract, ContractId, CurrencyCode, Digest,
    Transaction, TransactionId, TransactionKind,
};
use tally_store::StoreError;

use crate::workspace::{BalanceOverflow, CycleContext, CycleWorkspace};
use crate::{BASE_GAS, CALL_GAS, DEPLOYMENT_GAS};

/// Creation payload carried by a user-creation transaction.
///
/// Extra payload fields are preserved in the stored transaction and the
/// payload digest, but only these are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Requested unique handle, marker included.
    pub username: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Opaque public key material.
    pub public_key: String,
    /// Optional profile text.
    #[serde(default)]
    pub bio: Option<String>,
}

/// Deployment payload carried by a contract-deployment transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSource {
    /// Contract name.
    pub name: String,
    /// Source text; stored, never executed.
    pub source_code: String,
    /// Client-supplied hash of the source.
    pub code_hash: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional free-form deployment metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Optional version label; defaults to [`Contract::DEFAULT_VERSION`].
    #[serde(default)]
    pub version: Option<String>,
}

/// One typed state mutation performed by a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateChange {
    /// An account record was created.
    AccountCreated {
        /// Id of the new account.
        id: AccountId,
    },
    /// A contract record was created.
    ContractCreated {
        /// Id of the new contract.
        id: ContractId,
    },
    /// A balance moved by a signed amount.
    BalanceAdjusted {
        /// Account whose balance moved.
        owner: AccountId,
        /// Currency dimension.
        currency: CurrencyCode,
        /// Signed movement.
        delta: Amount,
    },
}

/// Outcome of applying one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Gas the transaction consumed.
    pub gas_used: u64,
    /// State mutations the transaction performed, in order.
    pub changes: Vec<StateChange>,
}

/// Reasons a transaction fails during execution.
///
/// These mark the offending transaction `Failed`; they never abort the
/// cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The engine has no execution rule for this kind.
    #[error("unsupported transaction kind: {kind}")]
    UnsupportedKind {
        /// Wire label of the unsupported kind.
        kind: String,
    },
    /// A transfer is missing a positive amount.
    #[error("transfer requires a positive amount")]
    InvalidAmount,
    /// A transfer is missing a currency.
    #[error("transfer requires a currency")]
    MissingCurrency,
    /// A transfer would push a balance outside `Amount` range.
    #[error("balance of {owner} in {currency} would overflow")]
    BalanceOverflow {
        /// Account whose balance would wrap.
        owner: AccountId,
        /// Currency dimension of the wrapping balance.
        currency: CurrencyCode,
    },
    /// A creation payload is absent or not decodable.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload {
        /// Kind whose payload failed to decode.
        kind: TransactionKind,
        /// Decoder message.
        reason: String,
    },
    /// A user-creation payload has an empty required field.
    #[error("user creation payload is incomplete")]
    IncompleteProfile,
    /// The requested username does not start with the marker.
    #[error("username {username} must start with '@'")]
    UsernameMarker {
        /// Offending username.
        username: String,
    },
    /// The requested username is already held or claimed.
    #[error("username {username} is already taken")]
    UsernameTaken {
        /// Contested username.
        username: String,
    },
    /// The target account id is already occupied.
    #[error("account {id} already exists")]
    AccountExists {
        /// Occupied id.
        id: AccountId,
    },
    /// A deployment payload has an empty required field.
    #[error("contract deployment payload is incomplete")]
    IncompleteContract,
    /// The target contract id is already occupied.
    #[error("contract {id} already exists")]
    ContractExists {
        /// Occupied id.
        id: ContractId,
    },
    /// A call names no contract.
    #[error("contract call requires a contract id")]
    MissingContract,
    /// The called contract does not exist.
    #[error("contract {id} not found")]
    ContractNotFound {
        /// Missing contract id.
        id: ContractId,
    },
    /// The called contract exists but is inactive.
    #[error("contract {id} is inactive")]
    ContractInactive {
        /// Inactive contract id.
        id: ContractId,
    },
}

impl From<BalanceOverflow> for ValidationError {
    fn from(overflow: BalanceOverflow) -> Self {
        ValidationError::BalanceOverflow {
            owner: overflow.owner,
            currency: overflow.currency,
        }
    }
}

/// Execution failure: either the transaction is invalid or the store broke.
///
/// Callers must treat the two sides differently. `Validation` fails one
/// transaction and the batch continues; `Store` aborts the whole cycle.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The transaction itself is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Reading state failed; no verdict on the transaction.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A transaction decoded into its typed execution form.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Move an amount between two accounts.
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Amount,
        currency: CurrencyCode,
    },
    /// Create the account the transaction's `to` id reserves.
    CreateUser {
        id: AccountId,
        profile: UserProfile,
        payload_digest: Digest,
    },
    /// Register the contract the transaction's `to` id reserves.
    DeployContract {
        id: ContractId,
        owner: AccountId,
        transaction: TransactionId,
        source: ContractSource,
    },
    /// Validate a call against an existing active contract.
    CallContract { id: ContractId },
}

impl Effect {
    /// Decode a stored transaction into its typed effect.
    pub fn decode(tx: &Transaction) -> Result<Effect, ValidationError> {
        match &tx.kind {
            TransactionKind::Transfer => {
                let amount = tx.amount.filter(|amount| *amount > 0);
                let amount = amount.ok_or(ValidationError::InvalidAmount)?;
                let currency = tx
                    .currency
                    .clone()
                    .filter(|currency| !currency.is_empty())
                    .ok_or(ValidationError::MissingCurrency)?;
                Ok(Effect::Transfer {
                    from: tx.from,
                    to: tx.to,
                    amount,
                    currency,
                })
            }
            TransactionKind::UserCreation => {
                let payload = tx.payload.as_ref().ok_or_else(|| {
                    ValidationError::MalformedPayload {
                        kind: tx.kind.clone(),
                        reason: "payload is missing".to_string(),
                    }
                })?;
                let profile: UserProfile =
                    serde_json::from_value(payload.clone()).map_err(|err| {
                        ValidationError::MalformedPayload {
                            kind: tx.kind.clone(),
                            reason: err.to_string(),
                        }
                    })?;
                if profile.username.is_empty()
                    || profile.display_name.is_empty()
                    || profile.public_key.is_empty()
                {
                    return Err(ValidationError::IncompleteProfile);
                }
                if !profile.username.starts_with(Account::USERNAME_MARKER) {
                    return Err(ValidationError::UsernameMarker {
                        username: profile.username,
                    });
                }
                let payload_digest = canonical::digest_json(payload).map_err(|err| {
                    ValidationError::MalformedPayload {
                        kind: tx.kind.clone(),
                        reason: err.to_string(),
                    }
                })?;
                Ok(Effect::CreateUser {
                    id: tx.to,
                    profile,
                    payload_digest,
                })
            }
            TransactionKind::ContractDeployment => {
                let payload = tx.payload.as_ref().ok_or_else(|| {
                    ValidationError::MalformedPayload {
                        kind: tx.kind.clone(),
                        reason: "payload is missing".to_string(),
                    }
                })?;
                let source: ContractSource =
                    serde_json::from_value(payload.clone()).map_err(|err| {
                        ValidationError::MalformedPayload {
                            kind: tx.kind.clone(),
                            reason: err.to_string(),
                        }
                    })?;
                if source.name.is_empty()
                    || source.source_code.is_empty()
                    || source.code_hash.is_empty()
                {
                    return Err(ValidationError::IncompleteContract);
                }
                Ok(Effect::DeployContract {
                    id: ContractId::from_uuid(tx.to.uuid()),
                    owner: tx.from,
                    transaction: tx.id,
                    source,
                })
            }
            TransactionKind::ContractCall => {
                let id = tx.contract_id.ok_or(ValidationError::MissingContract)?;
                Ok(Effect::CallContract { id })
            }
            TransactionKind::Other(label) => Err(ValidationError::UnsupportedKind {
                kind: label.clone(),
            }),
        }
    }

    /// Gas the effect charges when it confirms.
    pub fn gas(&self) -> u64 {
        match self {
            Effect::Transfer { .. } | Effect::CreateUser { .. } => BASE_GAS,
            Effect::DeployContract { .. } => DEPLOYMENT_GAS,
            Effect::CallContract { .. } => CALL_GAS,
        }
    }

    /// Check the effect against current state, overlay included.
    pub async fn validate(&self, workspace: &CycleWorkspace) -> Result<(), ExecError> {
        match self {
            Effect::Transfer {
                from,
                to,
                amount,
                currency,
            } => {
                // Overdrafts are legal; leaving `Amount` range is not.
                // Each side is checked against the committed balance plus
                // the deltas already pending in this cycle.
                if !workspace.adjustment_fits(*from, currency, -*amount).await? {
                    return Err(ValidationError::BalanceOverflow {
                        owner: *from,
                        currency: currency.clone(),
                    }
                    .into());
                }
                if !workspace.adjustment_fits(*to, currency, *amount).await? {
                    return Err(ValidationError::BalanceOverflow {
                        owner: *to,
                        currency: currency.clone(),
                    }
                    .into());
                }
                Ok(())
            }
            Effect::CreateUser { id, profile, .. } => {
                if workspace.account_exists(*id).await? {
                    return Err(ValidationError::AccountExists { id: *id }.into());
                }
                if workspace.username_taken(&profile.username).await? {
                    return Err(ValidationError::UsernameTaken {
                        username: profile.username.clone(),
                    }
                    .into());
                }
                Ok(())
            }
            Effect::DeployContract { id, .. } => {
                if workspace.contract(*id).await?.is_some() {
                    return Err(ValidationError::ContractExists { id: *id }.into());
                }
                Ok(())
            }
            Effect::CallContract { id } => {
                let contract = workspace
                    .contract(*id)
                    .await?
                    .ok_or(ValidationError::ContractNotFound { id: *id })?;
                if !contract.is_active {
                    return Err(ValidationError::ContractInactive { id: *id }.into());
                }
                Ok(())
            }
        }
    }

    /// Record the effect's writes in the workspace.
    ///
    /// Balance recording uses checked math; a transfer that passed
    /// [`Effect::validate`] against the same workspace cannot fail here.
    pub fn apply(
        self,
        workspace: &mut CycleWorkspace,
        ctx: &CycleContext,
    ) -> Result<Applied, ValidationError> {
        let gas_used = self.gas();
        let changes = match self {
            Effect::Transfer {
                from,
                to,
                amount,
                currency,
            } => {
                workspace.adjust_balance(from, &currency, -amount)?;
                workspace.adjust_balance(to, &currency, amount)?;
                vec![
                    StateChange::BalanceAdjusted {
                        owner: from,
                        currency: currency.clone(),
                        delta: -amount,
                    },
                    StateChange::BalanceAdjusted {
                        owner: to,
                        currency,
                        delta: amount,
                    },
                ]
            }
            Effect::CreateUser {
                id,
                profile,
                payload_digest,
            } => {
                workspace.create_account(Account {
                    id,
                    username: profile.username,
                    display_name: profile.display_name,
                    public_key: profile.public_key,
                    bio: profile.bio,
                    state_hash: payload_digest,
                    created_at: ctx.timestamp,
                });
                vec![StateChange::AccountCreated { id }]
            }
            Effect::DeployContract {
                id,
                owner,
                transaction,
                source,
            } => {
                workspace.create_contract(Contract {
                    id,
                    owner,
                    name: source.name,
                    source_code: source.source_code,
                    code_hash: source.code_hash,
                    description: source.description,
                    metadata: source.metadata,
                    version: source
                        .version
                        .unwrap_or_else(|| Contract::DEFAULT_VERSION.to_string()),
                    is_active: true,
                    deployed_in_block: ctx.height,
                    deployment_tx_id: transaction,
                    created_at: ctx.timestamp,
                });
                vec![StateChange::ContractCreated { id }]
            }
            Effect::CallContract { .. } => Vec::new(),
        };
        Ok(Applied { gas_used, changes })
    }
}

/// Run one transaction through decode, validate, and apply.
pub async fn execute(
    tx: &Transaction,
    workspace: &mut CycleWorkspace,
    ctx: &CycleContext,
) -> Result<Applied, ExecError> {
    let effect = Effect::decode(tx)?;
    effect.validate(workspace).await?;
    Ok(effect.apply(workspace, ctx)?)
}
