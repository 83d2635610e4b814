//! Correlation of classified state changes with their causal sources.
//!
//! Second stage of the derivation pipeline. Each pass walks the
//! chain-reported causal sources in order, consumes the matching bucket
//! entries, verifies the recovered account against the independently
//! expected one, and emits event drafts. The passes run in a fixed
//! order (validator, transaction, receipt/reward) so the subsequent
//! index assignment is reproducible.
//!
//! Consumption is strict: every keyed entry must be claimed by exactly
//! one causal source. Leftovers after a pass mean the stream is
//! internally inconsistent and the whole shard is abandoned.

use std::collections::HashMap;

use crate::error::{CausalBucket, DomainError, DomainResult};
use crate::models::{
    AccountBalance, AccountId, Balance, CryptoHash, Direction, EventCause, EventStatus,
    ExecutionOutcome, ReceiptView, TransactionView,
};

/// A balance event before index assignment.
///
/// Drafts carry everything but the block context and ordinal, which
/// `event_index::assign_event_indices` stamps once the emission order
/// is final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub affected_account_id: AccountId,
    pub involved_account_id: Option<AccountId>,
    pub cause: EventCause,
    pub direction: Direction,
    pub absolute_non_staked_amount: Balance,
    pub absolute_staked_amount: Balance,
    pub transaction_hash: Option<CryptoHash>,
    pub receipt_id: Option<CryptoHash>,
    pub status: EventStatus,
}

/// Emit one inbound VALIDATORS_REWARD event per epoch-boundary balance
/// update. These have no per-entry causal source to cross-check, so
/// this pass cannot fail.
pub fn correlate_validators(validators: Vec<AccountBalance>) -> Vec<EventDraft> {
    validators
        .into_iter()
        .map(|balance| EventDraft {
            affected_account_id: balance.account_id,
            involved_account_id: None,
            cause: EventCause::ValidatorsReward,
            direction: Direction::Inbound,
            absolute_non_staked_amount: balance.non_staked_amount,
            absolute_staked_amount: balance.staked_amount,
            transaction_hash: None,
            receipt_id: None,
            status: EventStatus::Success,
        })
        .collect()
}

/// Match the transaction bucket against the shard's included
/// transactions, in inclusion order.
///
/// A transaction without a bucket entry changed no balances and is
/// skipped. A consumed entry must name the transaction's signer;
/// anything else is a fatal [`DomainError::CorrelationMismatch`].
pub fn correlate_transactions(
    transactions: &[TransactionView],
    bucket: &mut HashMap<CryptoHash, AccountBalance>,
    block_height: u64,
) -> DomainResult<Vec<EventDraft>> {
    let mut events = Vec::with_capacity(bucket.len());

    for transaction in transactions {
        // Not every included transaction touches balances.
        let Some(balance) = bucket.remove(&transaction.hash) else {
            continue;
        };
        expect_account(
            &balance,
            &transaction.signer_id,
            &transaction.hash,
            block_height,
        )?;

        events.push(EventDraft {
            affected_account_id: balance.account_id,
            involved_account_id: non_system(&transaction.receiver_id),
            cause: EventCause::Transaction,
            direction: Direction::Outbound,
            absolute_non_staked_amount: balance.non_staked_amount,
            absolute_staked_amount: balance.staked_amount,
            transaction_hash: Some(transaction.hash.clone()),
            receipt_id: None,
            status: transaction.outcome_status.to_event_status(),
        });
    }

    ensure_consumed(bucket, CausalBucket::Transactions, block_height)?;
    Ok(events)
}

/// Match the receipt and reward buckets against the shard's execution
/// outcomes, in outcome order.
///
/// The receipt application and its gas reward are reported as two
/// independent state changes keyed by the same receipt id; either, both
/// or neither may exist, and each produces its own event.
pub fn correlate_receipts_and_rewards(
    outcomes: &[ExecutionOutcome],
    receipts: &mut HashMap<CryptoHash, AccountBalance>,
    rewards: &mut HashMap<CryptoHash, AccountBalance>,
    block_height: u64,
) -> DomainResult<Vec<EventDraft>> {
    let mut events = Vec::with_capacity(receipts.len() + rewards.len());

    for outcome in outcomes {
        let Some(receipt) = &outcome.receipt else {
            continue;
        };
        let status = outcome.outcome_status.to_event_status();

        if let Some(balance) = receipts.remove(&receipt.id) {
            expect_account(&balance, &receipt.receiver_id, &receipt.id, block_height)?;
            events.push(receipt_draft(balance, receipt, EventCause::Receipt, status));
        }
        if let Some(balance) = rewards.remove(&receipt.id) {
            expect_account(&balance, &receipt.receiver_id, &receipt.id, block_height)?;
            events.push(receipt_draft(
                balance,
                receipt,
                EventCause::ContractReward,
                status,
            ));
        }
    }

    ensure_consumed(receipts, CausalBucket::Receipts, block_height)?;
    ensure_consumed(rewards, CausalBucket::Rewards, block_height)?;
    Ok(events)
}

fn receipt_draft(
    balance: AccountBalance,
    receipt: &ReceiptView,
    cause: EventCause,
    status: EventStatus,
) -> EventDraft {
    EventDraft {
        affected_account_id: balance.account_id,
        involved_account_id: non_system(&receipt.predecessor_id),
        cause,
        direction: Direction::Inbound,
        absolute_non_staked_amount: balance.non_staked_amount,
        absolute_staked_amount: balance.staked_amount,
        transaction_hash: None,
        receipt_id: Some(receipt.id.clone()),
        status,
    }
}

/// The system account is never a counterparty in the ledger.
fn non_system(account_id: &AccountId) -> Option<AccountId> {
    (!account_id.is_system()).then(|| account_id.clone())
}

fn expect_account(
    balance: &AccountBalance,
    expected: &AccountId,
    key: &CryptoHash,
    block_height: u64,
) -> DomainResult<()> {
    if balance.account_id != *expected {
        return Err(DomainError::CorrelationMismatch {
            key: key.clone(),
            expected: expected.clone(),
            actual: balance.account_id.clone(),
            block_height,
        });
    }
    Ok(())
}

/// After a pass, its bucket must be empty: leftovers mean the stream's
/// causal sources didn't account for all classified state changes.
fn ensure_consumed(
    bucket: &HashMap<CryptoHash, AccountBalance>,
    kind: CausalBucket,
    block_height: u64,
) -> DomainResult<()> {
    if bucket.is_empty() {
        return Ok(());
    }
    // Sorted so identical corrupt input yields an identical diagnostic.
    let mut keys: Vec<String> = bucket.keys().map(|key| key.to_string()).collect();
    keys.sort();
    Err(DomainError::UnconsumedChange {
        bucket: kind,
        keys,
        block_height,
    })
}
