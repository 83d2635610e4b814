//! Port trait for the chain-data stream.
//!
//! This trait defines the interface for receiving per-block messages
//! from whatever mechanism retrieves chain data. Implementations live
//! in the infrastructure layer (e.g. `meridian-source`).

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::ChainResult;
use crate::models::BlockMessage;

/// Stream of per-block messages in height order.
pub type BlockStream = Pin<Box<dyn Stream<Item = ChainResult<BlockMessage>> + Send>>;

/// Port trait for the chain-data stream.
///
/// The indexer assumes at-least-once delivery: a message may be
/// redelivered after reconnects, which the idempotent persister makes
/// harmless.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Subscribe to block messages.
    ///
    /// With `start_after`, delivery begins at the first block strictly
    /// above that height; the indexer passes its cursor here on resume.
    /// A stream that ends without an error item means the source is
    /// exhausted (bounded replay); live sources yield an `Err` item on
    /// interruption so the caller can resubscribe.
    async fn subscribe(&self, start_after: Option<u64>) -> ChainResult<BlockStream>;
}
