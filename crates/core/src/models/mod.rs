//! Domain models for the balance-event ledger.
//!
//! These models are storage-agnostic and cover both sides of the engine:
//! the wire shapes delivered by the chain-data stream (block message,
//! state changes, transactions, execution outcomes) and the canonical
//! [`BalanceEvent`] rows derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The reserved account the chain uses as signer or receiver of protocol
/// operations. Ledger rows never name it as an involved account.
pub const SYSTEM_ACCOUNT: &str = "system";

/// Balance amount in the chain's smallest (yocto) unit.
pub type Balance = u128;

// =============================================================================
// Identifier newtypes
// =============================================================================

/// Human-readable account identifier (e.g. `alice.near`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the reserved system account.
    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_ACCOUNT
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Opaque chain hash in its base58 text form (transaction hashes,
/// receipt ids).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CryptoHash(pub String);

impl CryptoHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CryptoHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CryptoHash {
    fn from(hash: &str) -> Self {
        Self(hash.to_owned())
    }
}

// =============================================================================
// Stream wire format
// =============================================================================

/// One message from the chain-data stream: a block header plus the
/// per-shard data produced while applying that block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMessage {
    pub header: BlockHeader,
    pub shards: Vec<ShardData>,
}

/// Block header fields the engine needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block height.
    pub height: u64,
    /// Block timestamp in nanoseconds since the Unix epoch.
    pub timestamp_nanos: u64,
}

/// One shard's slice of a block: state changes plus the causal sources
/// (transactions and execution outcomes) expected to justify them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardData {
    pub shard_id: u64,
    pub state_changes: Vec<StateChange>,
    pub transactions: Vec<TransactionView>,
    pub execution_outcomes: Vec<ExecutionOutcome>,
}

/// A single reported mutation of chain state, tagged with its cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub cause: StateChangeCause,
    #[serde(rename = "change")]
    pub value: StateChangeValue,
}

/// Why a state change happened. Closed vocabulary: a well-formed stream
/// never emits tags outside this set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateChangeCause {
    NotWritableToDisk,
    InitialState,
    TransactionProcessing { tx_hash: CryptoHash },
    ActionReceiptProcessingStarted { receipt_hash: CryptoHash },
    ActionReceiptGasReward { receipt_hash: CryptoHash },
    ReceiptProcessing { receipt_hash: CryptoHash },
    PostponedReceipt { receipt_hash: CryptoHash },
    UpdatedDelayedReceipts,
    ValidatorAccountsUpdate,
    Migration,
    Resharding,
}

impl StateChangeCause {
    /// Wire tag, used in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            StateChangeCause::NotWritableToDisk => "not_writable_to_disk",
            StateChangeCause::InitialState => "initial_state",
            StateChangeCause::TransactionProcessing { .. } => "transaction_processing",
            StateChangeCause::ActionReceiptProcessingStarted { .. } => {
                "action_receipt_processing_started"
            }
            StateChangeCause::ActionReceiptGasReward { .. } => "action_receipt_gas_reward",
            StateChangeCause::ReceiptProcessing { .. } => "receipt_processing",
            StateChangeCause::PostponedReceipt { .. } => "postponed_receipt",
            StateChangeCause::UpdatedDelayedReceipts => "updated_delayed_receipts",
            StateChangeCause::ValidatorAccountsUpdate => "validator_accounts_update",
            StateChangeCause::Migration => "migration",
            StateChangeCause::Resharding => "resharding",
        }
    }
}

/// What changed. Only the account-level variants carry balance data;
/// the remaining kinds exist so a full stream parses cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateChangeValue {
    AccountUpdate {
        account_id: AccountId,
        #[serde(with = "dec_format")]
        non_staked_amount: Balance,
        #[serde(with = "dec_format")]
        staked_amount: Balance,
    },
    AccountDeletion {
        account_id: AccountId,
    },
    AccessKeyUpdate {
        account_id: AccountId,
    },
    AccessKeyDeletion {
        account_id: AccountId,
    },
    DataUpdate {
        account_id: AccountId,
    },
    DataDeletion {
        account_id: AccountId,
    },
    ContractCodeUpdate {
        account_id: AccountId,
    },
    ContractCodeDeletion {
        account_id: AccountId,
    },
}

/// Account balance snapshot recovered from a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    #[serde(with = "dec_format")]
    pub non_staked_amount: Balance,
    #[serde(with = "dec_format")]
    pub staked_amount: Balance,
}

impl AccountBalance {
    /// Derive from a state change payload. Deletions zero both
    /// components; non-account payloads have no balance implication.
    pub fn from_change(value: &StateChangeValue) -> Option<Self> {
        match value {
            StateChangeValue::AccountUpdate {
                account_id,
                non_staked_amount,
                staked_amount,
            } => Some(Self {
                account_id: account_id.clone(),
                non_staked_amount: *non_staked_amount,
                staked_amount: *staked_amount,
            }),
            StateChangeValue::AccountDeletion { account_id } => Some(Self {
                account_id: account_id.clone(),
                non_staked_amount: 0,
                staked_amount: 0,
            }),
            _ => None,
        }
    }
}

/// A transaction included in the shard's chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub hash: CryptoHash,
    pub signer_id: AccountId,
    pub receiver_id: AccountId,
    #[serde(default)]
    pub outcome_status: ExecutionStatus,
}

/// Result of applying one receipt, as reported by the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    #[serde(default)]
    pub outcome_status: ExecutionStatus,
    /// Absent for outcomes with no receipt attached (e.g. conversion
    /// outcomes); such outcomes carry no balance implication.
    pub receipt: Option<ReceiptView>,
}

/// The receipt an execution outcome applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptView {
    pub id: CryptoHash,
    pub receiver_id: AccountId,
    pub predecessor_id: AccountId,
}

/// Execution status vocabulary of the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    SuccessValue,
    SuccessReceiptId,
    Failure,
    #[default]
    Unknown,
}

impl ExecutionStatus {
    /// Map to the ledger vocabulary: success-like statuses collapse to
    /// SUCCESS, explicit failure to FAILURE, everything else to PENDING.
    pub fn to_event_status(self) -> EventStatus {
        match self {
            ExecutionStatus::SuccessValue | ExecutionStatus::SuccessReceiptId => {
                EventStatus::Success
            }
            ExecutionStatus::Failure => EventStatus::Failure,
            ExecutionStatus::Unknown => EventStatus::Pending,
        }
    }
}

// =============================================================================
// Ledger output
// =============================================================================

/// What caused a balance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCause {
    ValidatorsReward,
    Transaction,
    Receipt,
    ContractReward,
}

impl EventCause {
    pub fn as_str(self) -> &'static str {
        match self {
            EventCause::ValidatorsReward => "VALIDATORS_REWARD",
            EventCause::Transaction => "TRANSACTION",
            EventCause::Receipt => "RECEIPT",
            EventCause::ContractReward => "CONTRACT_REWARD",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "VALIDATORS_REWARD" => Some(EventCause::ValidatorsReward),
            "TRANSACTION" => Some(EventCause::Transaction),
            "RECEIPT" => Some(EventCause::Receipt),
            "CONTRACT_REWARD" => Some(EventCause::ContractReward),
            _ => None,
        }
    }
}

/// Whether value flowed into or out of the affected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "INBOUND",
            Direction::Outbound => "OUTBOUND",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "INBOUND" => Some(Direction::Inbound),
            "OUTBOUND" => Some(Direction::Outbound),
            _ => None,
        }
    }
}

/// Ledger status of the causal source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Success,
    Failure,
    Pending,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Success => "SUCCESS",
            EventStatus::Failure => "FAILURE",
            EventStatus::Pending => "PENDING",
        }
    }

    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(EventStatus::Success),
            "FAILURE" => Some(EventStatus::Failure),
            "PENDING" => Some(EventStatus::Pending),
            _ => None,
        }
    }
}

/// One row of the balance-event ledger.
///
/// Constructed once per block/shard pass, never mutated, persisted
/// append-only with `event_index` as the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEvent {
    /// Globally unique ordinal encoding block timestamp, shard and
    /// emission position (see `services::event_index`).
    #[serde(with = "dec_format")]
    pub event_index: u128,
    pub affected_account_id: AccountId,
    /// Counterparty account; `None` when the counterparty is the
    /// reserved system account.
    pub involved_account_id: Option<AccountId>,
    pub cause: EventCause,
    pub direction: Direction,
    #[serde(with = "dec_format")]
    pub absolute_non_staked_amount: Balance,
    #[serde(with = "dec_format")]
    pub absolute_staked_amount: Balance,
    /// Reserved for the analytics consumer; the engine never fills them.
    #[serde(default, with = "dec_format_opt")]
    pub delta_non_staked_amount: Option<i128>,
    #[serde(default, with = "dec_format_opt")]
    pub delta_staked_amount: Option<i128>,
    pub block_height: u64,
    pub block_timestamp_nanos: u64,
    pub transaction_hash: Option<CryptoHash>,
    pub receipt_id: Option<CryptoHash>,
    pub status: EventStatus,
}

// =============================================================================
// Indexer State
// =============================================================================

/// Ingestion cursor tracking progress.
///
/// The cursor records the last fully processed block per stream,
/// enabling the indexer to resume from where it left off. Because the
/// ledger insert is conflict-ignore on `event_index`, a crash between
/// persist and cursor update only causes a harmless redelivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestCursor {
    /// Stream identifier (source-specific).
    pub stream_id: String,
    /// Last fully processed block height.
    pub last_height: u64,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Decimal-string serde for 128-bit amounts
// =============================================================================

/// Serde adapter encoding 128-bit integers as decimal strings.
///
/// JSON numbers cannot carry u128 amounts safely through every
/// consumer, so the wire format uses strings (`"100"`).
pub mod dec_format {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// [`dec_format`] for optional values; `None` maps to JSON null.
pub mod dec_format_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: std::fmt::Display,
    {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let opt = Option::<String>::deserialize(deserializer)?;
        opt.map(|s| s.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn system_account_detection() {
        assert!(AccountId::from("system").is_system());
        assert!(!AccountId::from("system.near").is_system());
        assert!(!AccountId::from("alice.near").is_system());
    }

    #[test]
    fn balance_from_account_update() {
        let value = StateChangeValue::AccountUpdate {
            account_id: "alice.near".into(),
            non_staked_amount: 100,
            staked_amount: 7,
        };
        let balance = AccountBalance::from_change(&value).unwrap();
        assert_eq!(balance.account_id.as_str(), "alice.near");
        assert_eq!(balance.non_staked_amount, 100);
        assert_eq!(balance.staked_amount, 7);
    }

    // Une suppression de compte remet les deux composantes à zéro
    #[test]
    fn balance_from_account_deletion_is_zero() {
        let value = StateChangeValue::AccountDeletion {
            account_id: "gone.near".into(),
        };
        let balance = AccountBalance::from_change(&value).unwrap();
        assert_eq!(balance.non_staked_amount, 0);
        assert_eq!(balance.staked_amount, 0);
    }

    #[test]
    fn balance_ignores_non_account_payloads() {
        let value = StateChangeValue::DataUpdate {
            account_id: "alice.near".into(),
        };
        assert!(AccountBalance::from_change(&value).is_none());
    }

    // Test critique: le format wire complet se désérialise, montants u128 en strings
    #[test]
    fn block_message_wire_roundtrip() {
        let raw = json!({
            "header": { "height": 90, "timestamp_nanos": 1_600_000_000_000_000_000u64 },
            "shards": [{
                "shard_id": 1,
                "state_changes": [{
                    "cause": { "type": "transaction_processing", "tx_hash": "H1" },
                    "change": {
                        "type": "account_update",
                        "account_id": "alice.near",
                        "non_staked_amount": "340282366920938463463374607431768211455",
                        "staked_amount": "0"
                    }
                }],
                "transactions": [{
                    "hash": "H1",
                    "signer_id": "alice.near",
                    "receiver_id": "bob.near",
                    "outcome_status": "success_value"
                }],
                "execution_outcomes": []
            }]
        });

        let message: BlockMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(message.header.height, 90);
        let shard = &message.shards[0];
        assert_eq!(
            shard.state_changes[0].cause,
            StateChangeCause::TransactionProcessing {
                tx_hash: "H1".into()
            }
        );
        let balance = AccountBalance::from_change(&shard.state_changes[0].value).unwrap();
        assert_eq!(balance.non_staked_amount, u128::MAX);
        assert_eq!(
            shard.transactions[0].outcome_status,
            ExecutionStatus::SuccessValue
        );

        let back = serde_json::to_value(&message).unwrap();
        let again: BlockMessage = serde_json::from_value(back).unwrap();
        assert_eq!(again.header.height, 90);
    }

    // Un outcome_status absent doit se résoudre en PENDING
    #[test]
    fn missing_outcome_status_maps_to_pending() {
        let raw = json!({
            "hash": "H2",
            "signer_id": "alice.near",
            "receiver_id": "bob.near"
        });
        let tx: TransactionView = serde_json::from_value(raw).unwrap();
        assert_eq!(tx.outcome_status, ExecutionStatus::Unknown);
        assert_eq!(tx.outcome_status.to_event_status(), EventStatus::Pending);
    }

    #[test]
    fn status_mapping_vocabulary() {
        assert_eq!(
            ExecutionStatus::SuccessValue.to_event_status(),
            EventStatus::Success
        );
        assert_eq!(
            ExecutionStatus::SuccessReceiptId.to_event_status(),
            EventStatus::Success
        );
        assert_eq!(
            ExecutionStatus::Failure.to_event_status(),
            EventStatus::Failure
        );
        assert_eq!(
            ExecutionStatus::Unknown.to_event_status(),
            EventStatus::Pending
        );
    }

    #[test]
    fn ledger_enum_db_strings_roundtrip() {
        for cause in [
            EventCause::ValidatorsReward,
            EventCause::Transaction,
            EventCause::Receipt,
            EventCause::ContractReward,
        ] {
            assert_eq!(EventCause::try_from_str(cause.as_str()), Some(cause));
        }
        assert_eq!(EventCause::try_from_str("MINTING"), None);
        assert_eq!(
            Direction::try_from_str(Direction::Inbound.as_str()),
            Some(Direction::Inbound)
        );
        assert_eq!(
            EventStatus::try_from_str(EventStatus::Pending.as_str()),
            Some(EventStatus::Pending)
        );
    }
}
