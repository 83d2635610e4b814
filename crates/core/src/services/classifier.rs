//! State-change classification.
//!
//! First stage of the derivation pipeline: one shard's ordered state
//! changes are partitioned into cause-keyed collections that the
//! correlators then match against their causal sources.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::{CausalBucket, DomainError, DomainResult};
use crate::models::{AccountBalance, CryptoHash, StateChange, StateChangeCause};

/// Classified output of one shard's state changes.
///
/// `validators` keeps the input order; the keyed buckets are consumed
/// by hash lookup, so their iteration order never matters.
#[derive(Debug, Default)]
pub struct ClassifiedChanges {
    pub validators: Vec<AccountBalance>,
    pub transactions: HashMap<CryptoHash, AccountBalance>,
    pub receipts: HashMap<CryptoHash, AccountBalance>,
    pub rewards: HashMap<CryptoHash, AccountBalance>,
}

/// Partition one shard's state changes by cause.
///
/// Changes without balance implication (access keys, contract data) are
/// skipped. A cause type from the disallowed set fails immediately with
/// [`DomainError::UnexpectedCauseType`]: those causes must never carry
/// account-level changes in a well-formed stream. A second change
/// claiming an already-taken transaction/receipt/reward key fails with
/// [`DomainError::DuplicateCausalChange`].
pub fn classify_state_changes(
    state_changes: &[StateChange],
    block_height: u64,
) -> DomainResult<ClassifiedChanges> {
    let mut classified = ClassifiedChanges::default();

    for state_change in state_changes {
        let Some(balance) = AccountBalance::from_change(&state_change.value) else {
            continue;
        };

        match &state_change.cause {
            StateChangeCause::ValidatorAccountsUpdate => classified.validators.push(balance),
            StateChangeCause::TransactionProcessing { tx_hash } => insert_keyed(
                &mut classified.transactions,
                CausalBucket::Transactions,
                tx_hash,
                balance,
                block_height,
            )?,
            StateChangeCause::ReceiptProcessing { receipt_hash } => insert_keyed(
                &mut classified.receipts,
                CausalBucket::Receipts,
                receipt_hash,
                balance,
                block_height,
            )?,
            StateChangeCause::ActionReceiptGasReward { receipt_hash } => insert_keyed(
                &mut classified.rewards,
                CausalBucket::Rewards,
                receipt_hash,
                balance,
                block_height,
            )?,
            cause @ (StateChangeCause::NotWritableToDisk
            | StateChangeCause::InitialState
            | StateChangeCause::ActionReceiptProcessingStarted { .. }
            | StateChangeCause::UpdatedDelayedReceipts
            | StateChangeCause::PostponedReceipt { .. }
            | StateChangeCause::Resharding) => {
                return Err(DomainError::UnexpectedCauseType {
                    cause: cause.tag(),
                    block_height,
                });
            }
            StateChangeCause::Migration => {}
        }
    }

    Ok(classified)
}

/// Check-then-insert into a keyed bucket; duplicate keys are fatal.
fn insert_keyed(
    bucket: &mut HashMap<CryptoHash, AccountBalance>,
    kind: CausalBucket,
    key: &CryptoHash,
    balance: AccountBalance,
    block_height: u64,
) -> DomainResult<()> {
    match bucket.entry(key.clone()) {
        Entry::Vacant(slot) => {
            slot.insert(balance);
            Ok(())
        }
        Entry::Occupied(_) => Err(DomainError::DuplicateCausalChange {
            bucket: kind,
            key: key.clone(),
            block_height,
        }),
    }
}
