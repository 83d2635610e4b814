//! Core business logic services.
//!
//! The derivation pipeline is split into small, pure stages:
//!
//! - [`classifier`] routes raw state changes into cause-keyed buckets
//! - [`correlator`] matches each bucket against its causal source
//! - [`event_index`] stamps deterministic global ordinals
//! - [`deriver`] composes the three into the per-shard entry point
//! - [`indexer`] runs the ingestion loop over the block stream

mod classifier;
mod correlator;
mod deriver;
mod event_index;
mod indexer;

pub use classifier::{ClassifiedChanges, classify_state_changes};
pub use correlator::{
    EventDraft, correlate_receipts_and_rewards, correlate_transactions, correlate_validators,
};
pub use deriver::derive_shard_events;
pub use event_index::{assign_event_indices, shard_index_base};
pub use indexer::{BalanceIndexer, IndexerConfig};
