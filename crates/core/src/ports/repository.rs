//! Port traits for the ledger store.
//!
//! These traits define the storage interface used by the domain layer.
//! Implementations live in the infrastructure layer (e.g.
//! `meridian-storage`).

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::{AccountId, BalanceEvent, IngestCursor};

/// Repository for the append-only balance-event ledger.
#[async_trait]
pub trait BalanceEventRepository: Send + Sync {
    /// Insert a shard batch in a single transaction.
    ///
    /// Conflict target is `event_index` with conflict action ignore, so
    /// re-ingesting an already-processed shard is a no-op rather than an
    /// error. Returns the number of rows actually written.
    async fn insert_events(&self, events: &[BalanceEvent]) -> StorageResult<u64>;

    /// Most recent events affecting an account, newest first.
    async fn events_for_account(
        &self,
        account_id: &AccountId,
        limit: u32,
    ) -> StorageResult<Vec<BalanceEvent>>;

    /// Delete all events at or above a block height.
    ///
    /// Operator tooling only; the engine itself never deletes ledger
    /// rows.
    async fn delete_events_from(&self, from_height: u64) -> StorageResult<u64>;
}

/// Repository for ingestion cursor state.
#[async_trait]
pub trait CursorRepository: Send + Sync {
    /// Get current cursor for a stream.
    async fn get_cursor(&self, stream_id: &str) -> StorageResult<Option<IngestCursor>>;

    /// Update cursor (upsert).
    async fn set_cursor(&self, cursor: &IngestCursor) -> StorageResult<()>;
}

/// Combined repository access for the indexer.
pub trait Repositories: Send + Sync {
    /// Access the balance-event repository.
    fn balance_events(&self) -> &dyn BalanceEventRepository;

    /// Access the cursor repository.
    fn cursor(&self) -> &dyn CursorRepository;
}
