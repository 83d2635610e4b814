//! Core domain layer for the Meridian balance-event indexer.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! business logic for deriving a globally ordered ledger of balance
//! events from raw per-block chain data. It follows hexagonal
//! architecture principles - this is the innermost layer with no
//! dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    meridian (binary)                        │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │       meridian-source        │       meridian-storage       │
//! │     (block-data stream)      │        (PostgreSQL)          │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                   meridian-core  ← YOU ARE HERE             │
//! │                 (models, ports, services)                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (state changes, balance events, cursor)
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - Derivation pipeline and ingestion loop
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Derivation pipeline
//!
//! Each shard of a block message goes through a fixed, pure pipeline:
//!
//! 1. [`services::classify_state_changes`] partitions raw state changes
//!    into cause-keyed collections.
//! 2. The three correlation passes match each collection against its
//!    expected causal source (validator updates, transactions, receipt
//!    outcomes) and emit events in a fixed order.
//! 3. [`services::assign_event_indices`] stamps a deterministic global
//!    ordinal derived from block timestamp, shard id, and emission
//!    position.
//!
//! Any data-consistency violation aborts the shard before the batch
//! reaches the persister; a shard's events are all written or none are.
//!
//! ## Indexer lifecycle
//!
//! 1. Subscribe to block messages from the stream, after the cursor
//! 2. Derive every shard's event batch (nothing written yet)
//! 3. Persist each batch idempotently (conflict-ignore on event index)
//! 4. Advance the cursor for progress tracking

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;
