//! Balance-event repository implementation for PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;

use meridian_core::error::{StorageError, StorageResult};
use meridian_core::models::{AccountId, BalanceEvent, CryptoHash};
use meridian_core::ports::BalanceEventRepository;

use super::helpers::{parse_cause, parse_direction, parse_opt_i128, parse_status, parse_u128};

// =============================================================================
// Repository Implementation
// =============================================================================

/// PostgreSQL implementation of BalanceEventRepository.
pub struct PgBalanceEventRepository {
    pool: PgPool,
}

impl PgBalanceEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceEventRepository for PgBalanceEventRepository {
    async fn insert_events(&self, events: &[BalanceEvent]) -> StorageResult<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        let mut written = 0;
        for event in events {
            let result = sqlx::query(
                r#"
                INSERT INTO balance_events (
                    event_index, affected_account_id, involved_account_id,
                    cause, direction,
                    absolute_non_staked_amount, absolute_staked_amount,
                    delta_non_staked_amount, delta_staked_amount,
                    block_height, block_timestamp_nanos,
                    transaction_hash, receipt_id, status
                )
                VALUES (
                    $1::NUMERIC, $2, $3, $4, $5,
                    $6::NUMERIC, $7::NUMERIC, $8::NUMERIC, $9::NUMERIC,
                    $10, $11, $12, $13, $14
                )
                ON CONFLICT (event_index) DO NOTHING
                "#,
            )
            .bind(event.event_index.to_string())
            .bind(event.affected_account_id.as_str())
            .bind(event.involved_account_id.as_ref().map(|a| a.as_str()))
            .bind(event.cause.as_str())
            .bind(event.direction.as_str())
            .bind(event.absolute_non_staked_amount.to_string())
            .bind(event.absolute_staked_amount.to_string())
            .bind(event.delta_non_staked_amount.map(|d| d.to_string()))
            .bind(event.delta_staked_amount.map(|d| d.to_string()))
            .bind(event.block_height as i64)
            .bind(event.block_timestamp_nanos as i64)
            .bind(event.transaction_hash.as_ref().map(|h| h.as_str()))
            .bind(event.receipt_id.as_ref().map(|r| r.as_str()))
            .bind(event.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

            written += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        Ok(written)
    }

    async fn events_for_account(
        &self,
        account_id: &AccountId,
        limit: u32,
    ) -> StorageResult<Vec<BalanceEvent>> {
        let rows = sqlx::query_as::<_, BalanceEventRow>(
            r#"
            SELECT event_index::TEXT, affected_account_id, involved_account_id,
                   cause, direction,
                   absolute_non_staked_amount::TEXT, absolute_staked_amount::TEXT,
                   delta_non_staked_amount::TEXT, delta_staked_amount::TEXT,
                   block_height, block_timestamp_nanos,
                   transaction_hash, receipt_id, status
            FROM balance_events
            WHERE affected_account_id = $1
            ORDER BY event_index DESC
            LIMIT $2
            "#,
        )
        .bind(account_id.as_str())
        .bind(i64::from(limit.min(1000)))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        rows.into_iter().map(BalanceEventRow::into_event).collect()
    }

    async fn delete_events_from(&self, from_height: u64) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM balance_events WHERE block_height >= $1")
            .bind(from_height as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct BalanceEventRow {
    event_index: String,
    affected_account_id: String,
    involved_account_id: Option<String>,
    cause: String,
    direction: String,
    absolute_non_staked_amount: String,
    absolute_staked_amount: String,
    delta_non_staked_amount: Option<String>,
    delta_staked_amount: Option<String>,
    block_height: i64,
    block_timestamp_nanos: i64,
    transaction_hash: Option<String>,
    receipt_id: Option<String>,
    status: String,
}

impl BalanceEventRow {
    fn into_event(self) -> StorageResult<BalanceEvent> {
        Ok(BalanceEvent {
            event_index: parse_u128(&self.event_index, "balance_event.event_index")?,
            affected_account_id: AccountId(self.affected_account_id),
            involved_account_id: self.involved_account_id.map(AccountId),
            cause: parse_cause(&self.cause)?,
            direction: parse_direction(&self.direction)?,
            absolute_non_staked_amount: parse_u128(
                &self.absolute_non_staked_amount,
                "balance_event.absolute_non_staked_amount",
            )?,
            absolute_staked_amount: parse_u128(
                &self.absolute_staked_amount,
                "balance_event.absolute_staked_amount",
            )?,
            delta_non_staked_amount: parse_opt_i128(
                self.delta_non_staked_amount.as_deref(),
                "balance_event.delta_non_staked_amount",
            )?,
            delta_staked_amount: parse_opt_i128(
                self.delta_staked_amount.as_deref(),
                "balance_event.delta_staked_amount",
            )?,
            block_height: self.block_height as u64,
            block_timestamp_nanos: self.block_timestamp_nanos as u64,
            transaction_hash: self.transaction_hash.map(CryptoHash),
            receipt_id: self.receipt_id.map(CryptoHash),
            status: parse_status(&self.status)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::models::{Direction, EventCause, EventStatus};

    fn sample_row() -> BalanceEventRow {
        BalanceEventRow {
            event_index: "16000000000000000000000000010000002".to_string(),
            affected_account_id: "alice.near".to_string(),
            involved_account_id: Some("bob.near".to_string()),
            cause: "TRANSACTION".to_string(),
            direction: "OUTBOUND".to_string(),
            absolute_non_staked_amount: "100".to_string(),
            absolute_staked_amount: "0".to_string(),
            delta_non_staked_amount: None,
            delta_staked_amount: None,
            block_height: 90,
            block_timestamp_nanos: 1_600_000_000_000_000_000,
            transaction_hash: Some("H1".to_string()),
            receipt_id: None,
            status: "SUCCESS".to_string(),
        }
    }

    #[test]
    fn row_maps_back_to_domain_event() {
        let event = sample_row().into_event().unwrap();
        assert_eq!(event.cause, EventCause::Transaction);
        assert_eq!(event.direction, Direction::Outbound);
        assert_eq!(event.status, EventStatus::Success);
        assert_eq!(event.absolute_non_staked_amount, 100);
        assert_eq!(event.transaction_hash, Some("H1".into()));
        assert_eq!(event.delta_non_staked_amount, None);
    }

    // Test critique: une ligne corrompue échoue avec le nom du champ
    #[test]
    fn corrupt_row_names_the_field() {
        let mut row = sample_row();
        row.absolute_staked_amount = "corrupt".to_string();
        let err = row.into_event().unwrap_err();
        assert!(
            err.to_string()
                .contains("balance_event.absolute_staked_amount")
        );
    }

    #[test]
    fn unknown_cause_in_row_is_rejected() {
        let mut row = sample_row();
        row.cause = "AIRDROP".to_string();
        assert!(row.into_event().is_err());
    }
}
