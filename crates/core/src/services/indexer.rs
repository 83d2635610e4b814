//! Balance indexer service - orchestrates the ingestion loop.
//!
//! Subscribes to the block stream and runs every message through the
//! derivation pipeline before persisting. The loop owns retry/backoff
//! and cursor tracking; the derivation itself stays pure.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IndexerError, IndexerResult};
use crate::metrics::{
    ProcessingTimer, record_block_processed, record_consistency_failure, record_events_emitted,
    record_storage_retry,
};
use crate::models::{BalanceEvent, BlockMessage, IngestCursor};
use crate::ports::{BlockSource, Repositories};

use super::deriver::derive_shard_events;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the balance indexer.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Stream identifier used for cursor tracking.
    pub stream_id: String,
    /// Maximum retries for persisting one block.
    pub max_retries: u32,
    /// Delay between persistence retries.
    pub retry_delay: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            stream_id: "default".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

// =============================================================================
// BalanceIndexer
// =============================================================================

/// Main ingestion service.
///
/// # Flow
///
/// 1. Subscribe to block messages after the stored cursor
/// 2. For each message, derive every shard's event batch - nothing is
///    written until all shards derived cleanly
/// 3. Persist the batches (idempotent conflict-ignore inserts),
///    retrying transient storage failures
/// 4. Advance the cursor
///
/// # Failure policy
///
/// The four consistency errors ([`crate::error::DomainError`]) are
/// fatal: they stop the run with nothing persisted for the offending
/// block, leaving the operator to decide whether the stream can be
/// trusted. Stream errors trigger resubscription with exponential
/// backoff, resuming after the cursor.
pub struct BalanceIndexer<S: BlockSource, R: Repositories> {
    config: IndexerConfig,
    source: Arc<S>,
    repositories: Arc<R>,
}

impl<S: BlockSource, R: Repositories> BalanceIndexer<S, R> {
    pub fn new(config: IndexerConfig, source: Arc<S>, repositories: Arc<R>) -> Self {
        Self {
            config,
            source,
            repositories,
        }
    }

    /// Run the ingestion loop until the stream is exhausted, a fatal
    /// error occurs, or shutdown is requested.
    #[instrument(skip_all, fields(stream = %self.config.stream_id))]
    pub async fn run(
        &self,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> IndexerResult<()> {
        info!("⛓️  Starting balance indexer");

        // Exponential backoff configuration
        const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
        const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
        let mut retry_delay = INITIAL_RETRY_DELAY;

        loop {
            if *shutdown_rx.borrow() {
                debug!("Shutdown requested");
                return Err(IndexerError::ShutdownRequested);
            }

            let resume_after = self
                .repositories
                .cursor()
                .get_cursor(&self.config.stream_id)
                .await?
                .map(|cursor| cursor.last_height);

            match self.source.subscribe(resume_after).await {
                Ok(mut stream) => {
                    debug!(after = ?resume_after, "📡 Subscription established");
                    retry_delay = INITIAL_RETRY_DELAY; // Reset backoff on success

                    loop {
                        let Some(result) = stream.next().await else {
                            // Bounded sources end cleanly once drained.
                            info!("Stream ended");
                            return Ok(());
                        };

                        if *shutdown_rx.borrow() {
                            debug!("Shutdown requested");
                            return Err(IndexerError::ShutdownRequested);
                        }

                        match result {
                            Ok(message) => {
                                let height = message.header.height;
                                match self.process_message(&message).await {
                                    Ok(written) => {
                                        info!(block = height, events = written, "⛓️  Block processed");
                                    }
                                    Err(IndexerError::Domain(e)) => {
                                        record_consistency_failure(e.metric_label());
                                        error!(
                                            block = height,
                                            error = %e,
                                            "❌ Consistency violation, stopping"
                                        );
                                        return Err(IndexerError::Domain(e));
                                    }
                                    Err(e) => {
                                        error!(block = height, error = ?e, "❌ Block processing failed");
                                        return Err(e);
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(error = ?e, "⚠️  Stream error, resubscribing...");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        error = ?e,
                        retry_in_ms = retry_delay.as_millis(),
                        "⚠️  Failed to subscribe, retrying..."
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(retry_delay) => {
                    debug!(retry_delay_ms = retry_delay.as_millis(), "🔄 Reconnecting to stream...");
                    // Exponential backoff: double the delay, up to max
                    retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        return Err(IndexerError::ShutdownRequested);
                    }
                }
            }
        }
    }

    /// Process one block message end to end. Returns the number of rows
    /// actually written.
    ///
    /// Derivation for all shards completes before the first write, so a
    /// consistency violation anywhere leaves the ledger untouched.
    #[instrument(skip_all, fields(block = message.header.height))]
    async fn process_message(&self, message: &BlockMessage) -> IndexerResult<u64> {
        let _timer = ProcessingTimer::new();

        let mut batches: Vec<Vec<BalanceEvent>> = Vec::with_capacity(message.shards.len());
        for shard in &message.shards {
            let events = derive_shard_events(&message.header, shard)?;
            if !events.is_empty() {
                batches.push(events);
            }
        }

        let emitted: u64 = batches.iter().map(|batch| batch.len() as u64).sum();
        let written = self.persist_with_retry(&batches).await?;
        if written < emitted {
            debug!(
                skipped = emitted - written,
                "Redelivered events skipped by conflict target"
            );
        }

        let cursor = IngestCursor {
            stream_id: self.config.stream_id.clone(),
            last_height: message.header.height,
            updated_at: chrono::Utc::now(),
        };
        self.repositories.cursor().set_cursor(&cursor).await?;

        record_block_processed();
        record_events_emitted(written);
        Ok(written)
    }

    /// Persist all shard batches, retrying transient storage failures.
    ///
    /// Batches are independent transactions issued concurrently. Each
    /// one is conflict-ignore, so a retry after a partial success
    /// re-inserts only the missing rows.
    async fn persist_with_retry(&self, batches: &[Vec<BalanceEvent>]) -> IndexerResult<u64> {
        let mut attempt = 0;
        loop {
            let inserts = batches
                .iter()
                .map(|batch| self.repositories.balance_events().insert_events(batch));

            match futures::future::try_join_all(inserts).await {
                Ok(rows) => return Ok(rows.into_iter().sum()),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    record_storage_retry();
                    warn!(attempt, error = %e, "⚠️  Persist failed, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
